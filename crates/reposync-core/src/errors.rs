use crate::model::FailureKind;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that abort the run before any repository is touched.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("git client not found (searched: {})", format_searched(.searched))]
    ClientNotFound { searched: Vec<PathBuf> },
    #[error("git client at {path} is not usable: {detail}")]
    ClientUnusable { path: PathBuf, detail: String },
    #[error("repo root {path} cannot be created")]
    RepoRootUncreatable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid repository list: {0}")]
    InvalidRepositoryList(String),
    #[error("another sync is already running for {root} (lock: {lock})")]
    RunLocked { root: PathBuf, lock: PathBuf },
}

fn format_searched(searched: &[PathBuf]) -> String {
    if searched.is_empty() {
        return "nothing".to_string();
    }
    searched
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Per-repository failures; converted into a failed `JobResult` by the executor.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    CloneFailed(String),
    #[error("{0}")]
    StatusFailed(String),
    #[error("{0}")]
    ShelveFailed(String),
    #[error("{0}")]
    FetchFailed(String),
    #[error("{0}")]
    FastForwardRejected(String),
    #[error("{0}")]
    SubmoduleUpdateFailed(String),
    #[error("{0}")]
    UnshelveFailed(String),
}

impl RepoError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RepoError::CloneFailed(_) => FailureKind::CloneFailed,
            RepoError::StatusFailed(_) => FailureKind::StatusFailed,
            RepoError::ShelveFailed(_) => FailureKind::ShelveFailed,
            RepoError::FetchFailed(_) => FailureKind::FetchFailed,
            RepoError::FastForwardRejected(_) => FailureKind::FastForwardRejected,
            RepoError::SubmoduleUpdateFailed(_) => FailureKind::SubmoduleUpdateFailed,
            RepoError::UnshelveFailed(_) => FailureKind::UnshelveFailed,
        }
    }
}
