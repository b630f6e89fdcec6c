use crate::errors::SetupError;
use crate::model::RepoDescriptor;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub fn repo_path(root: &Path, name: &str) -> PathBuf {
    root.join(name)
}

/// A working copy exists when `.git` is present (directory, or file for
/// worktrees and submodules).
pub fn has_working_copy(path: &Path) -> bool {
    path.join(".git").exists()
}

pub fn check_repo_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("repository name is empty".to_string());
    }
    if name == "." || name == ".." {
        return Err(format!("repository name {name:?} is reserved"));
    }
    if let Some(ch) = name.chars().find(|ch| {
        matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') || ch.is_control()
    }) {
        return Err(format!(
            "repository name {name:?} contains invalid character {ch:?}"
        ));
    }
    if name.ends_with('.') || name.ends_with(' ') {
        return Err(format!(
            "repository name {name:?} must not end with a dot or space"
        ));
    }
    Ok(())
}

/// Names are compared case-insensitively: `Tools` and `tools` share a
/// directory on Windows and macOS.
pub fn validate_repositories(repos: &[RepoDescriptor]) -> Result<(), SetupError> {
    let mut seen = HashSet::new();
    for repo in repos {
        check_repo_name(&repo.name).map_err(SetupError::InvalidRepositoryList)?;
        if repo.url.trim().is_empty() {
            return Err(SetupError::InvalidRepositoryList(format!(
                "repository {} has an empty url",
                repo.name
            )));
        }
        if !seen.insert(repo.name.to_lowercase()) {
            return Err(SetupError::InvalidRepositoryList(format!(
                "duplicate repository name {}",
                repo.name
            )));
        }
    }
    Ok(())
}
