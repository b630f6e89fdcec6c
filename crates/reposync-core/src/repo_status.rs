use crate::errors::RepoError;
use crate::git_client::GitClient;
use crate::model::RepoDescriptor;
use crate::paths::{has_working_copy, repo_path};
use crate::shelf::is_dirty;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Local state of a repository, always read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoState {
    Absent,
    PresentClean,
    PresentDirty,
}

impl RepoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoState::Absent => "absent",
            RepoState::PresentClean => "clean",
            RepoState::PresentDirty => "dirty",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoLocalStatus {
    pub name: String,
    pub path: PathBuf,
    pub state: RepoState,
    pub head_branch: Option<String>,
    pub upstream: Option<String>,
    pub ahead: Option<u32>,
    pub behind: Option<u32>,
}

pub fn repo_state(client: &GitClient, path: &Path) -> Result<RepoState, RepoError> {
    if !has_working_copy(path) {
        return Ok(RepoState::Absent);
    }
    if is_dirty(client, path)? {
        Ok(RepoState::PresentDirty)
    } else {
        Ok(RepoState::PresentClean)
    }
}

pub fn compute_repo_status(
    client: &GitClient,
    root: &Path,
    repo: &RepoDescriptor,
) -> Result<RepoLocalStatus, RepoError> {
    let path = repo_path(root, &repo.name);
    let state = repo_state(client, &path)?;
    let mut status = RepoLocalStatus {
        name: repo.name.clone(),
        path: path.clone(),
        state,
        head_branch: None,
        upstream: None,
        ahead: None,
        behind: None,
    };
    if state == RepoState::Absent {
        return Ok(status);
    }

    status.head_branch = client
        .check(&path, &["symbolic-ref", "--quiet", "--short", "HEAD"])
        .ok()
        .filter(|branch| !branch.is_empty());
    status.upstream = client
        .check(
            &path,
            &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
        )
        .ok()
        .filter(|upstream| !upstream.is_empty());

    if let Some(upstream) = status.upstream.as_deref() {
        let range = format!("HEAD...{upstream}");
        if let Ok(counts) =
            client.check(&path, &["rev-list", "--left-right", "--count", range.as_str()])
        {
            let mut parts = counts.split_whitespace();
            status.ahead = parts.next().and_then(|value| value.parse().ok());
            status.behind = parts.next().and_then(|value| value.parse().ok());
        }
    }

    Ok(status)
}
