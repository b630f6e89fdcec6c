use crate::errors::SetupError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(windows)]
const GIT_EXE: &str = "git.exe";
#[cfg(not(windows))]
const GIT_EXE: &str = "git";

/// Finds the git executable: explicit path, then `PATH`, then well-known
/// install directories.
#[derive(Debug, Clone)]
pub struct ClientLocator {
    explicit: Option<PathBuf>,
    search_path: Option<OsString>,
    fallback_dirs: Vec<PathBuf>,
}

impl ClientLocator {
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            search_path: std::env::var_os("PATH"),
            fallback_dirs: well_known_dirs(),
        }
    }

    pub fn new(
        explicit: Option<PathBuf>,
        search_path: Option<OsString>,
        fallback_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            explicit,
            search_path,
            fallback_dirs,
        }
    }

    pub fn resolve(&self) -> Result<PathBuf, SetupError> {
        let mut searched = Vec::new();

        if let Some(explicit) = self.explicit.as_deref() {
            if is_executable(explicit) {
                debug!(path = %explicit.display(), "using configured git client");
                return Ok(explicit.to_path_buf());
            }
            warn!(
                path = %explicit.display(),
                "configured git client missing or not executable; searching"
            );
            searched.push(explicit.to_path_buf());
        }

        let path_dirs = self
            .search_path
            .as_ref()
            .map(|value| std::env::split_paths(value).collect::<Vec<_>>())
            .unwrap_or_default();
        for dir in path_dirs.iter().chain(self.fallback_dirs.iter()) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            let candidate = dir.join(GIT_EXE);
            if is_executable(&candidate) {
                debug!(path = %candidate.display(), "resolved git client");
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        Err(SetupError::ClientNotFound { searched })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(windows)]
fn well_known_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(program_files) = std::env::var_os("ProgramFiles") {
        let base = PathBuf::from(program_files).join("Git");
        dirs.push(base.join("cmd"));
        dirs.push(base.join("bin"));
    }
    if let Some(program_files_x86) = std::env::var_os("ProgramFiles(x86)") {
        dirs.push(PathBuf::from(program_files_x86).join("Git").join("cmd"));
    }
    if let Some(local) = std::env::var_os("LOCALAPPDATA") {
        dirs.push(
            PathBuf::from(local)
                .join("Programs")
                .join("Git")
                .join("cmd"),
        );
    }
    dirs
}

#[cfg(target_os = "macos")]
fn well_known_dirs() -> Vec<PathBuf> {
    [
        "/opt/homebrew/bin",
        "/usr/local/bin",
        "/usr/bin",
        "/Library/Developer/CommandLineTools/usr/bin",
    ]
    .into_iter()
    .map(PathBuf::from)
    .collect()
}

#[cfg(not(any(windows, target_os = "macos")))]
fn well_known_dirs() -> Vec<PathBuf> {
    ["/usr/bin", "/usr/local/bin", "/bin", "/snap/bin"]
        .into_iter()
        .map(PathBuf::from)
        .collect()
}
