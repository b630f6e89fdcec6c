use crate::dispatcher::{DispatchEvent, run_dispatch};
use crate::errors::SetupError;
use crate::executor::{GitExecutor, RepoExecutor};
use crate::git_client::GitClient;
use crate::locator::ClientLocator;
use crate::lockfile::{LockFile, lock_path_for_root};
use crate::model::{JobResult, OperationMode, RepoDescriptor};
use crate::paths::validate_repositories;
use crate::tracker::{FinalSummary, ProgressSnapshot, ProgressTracker};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub type SyncProgressReporter<'a> = dyn FnMut(SyncProgress<'_>) + 'a;

#[derive(Debug, Clone, Copy)]
pub enum SyncProgress<'a> {
    Started {
        name: &'a str,
        snapshot: ProgressSnapshot,
    },
    Finished {
        result: &'a JobResult,
        snapshot: ProgressSnapshot,
    },
}

#[derive(Debug, Clone)]
pub struct SyncPlan {
    pub repositories: Vec<RepoDescriptor>,
    pub repo_root: PathBuf,
    pub operation: OperationMode,
    pub max_threads: usize,
    pub locator: ClientLocator,
    pub operation_timeout: Duration,
    /// Directory for the per-root run lock; `None` disables locking.
    pub lock_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub client: PathBuf,
    pub summary: FinalSummary,
    pub results: Vec<JobResult>,
}

/// Resolves git and checks that it runs.
pub fn prepare_client(
    locator: &ClientLocator,
    operation_timeout: Duration,
) -> Result<GitClient, SetupError> {
    let path = locator.resolve()?;
    let client = GitClient::new(path.clone(), Some(operation_timeout));
    let version = client.version().map_err(|err| SetupError::ClientUnusable {
        path: path.clone(),
        detail: err.to_string(),
    })?;
    debug!(path = %path.display(), version = %version, "git client ready");
    Ok(client)
}

pub fn prepare_repo_root(root: &Path) -> Result<(), SetupError> {
    fs::create_dir_all(root).map_err(|source| SetupError::RepoRootUncreatable {
        path: root.to_path_buf(),
        source,
    })
}

/// Runs a whole sync: setup checks, then every repository through the worker
/// pool. Only setup failures are returned as errors.
pub fn run_sync(
    plan: &SyncPlan,
    progress: Option<&mut SyncProgressReporter<'_>>,
) -> anyhow::Result<SyncReport> {
    validate_repositories(&plan.repositories)?;
    let client = prepare_client(&plan.locator, plan.operation_timeout)?;
    prepare_repo_root(&plan.repo_root)?;

    let _lock = match plan.lock_dir.as_deref() {
        Some(lock_dir) => {
            let lock_path = lock_path_for_root(lock_dir, &plan.repo_root);
            match LockFile::try_acquire(&lock_path)? {
                Some(lock) => Some(lock),
                None => {
                    return Err(SetupError::RunLocked {
                        root: plan.repo_root.clone(),
                        lock: lock_path,
                    }
                    .into());
                }
            }
        }
        None => None,
    };

    info!(
        root = %plan.repo_root.display(),
        operation = %plan.operation,
        repos = plan.repositories.len(),
        max_threads = plan.max_threads,
        "starting sync"
    );

    let client_path = client.path().to_path_buf();
    let executor = Arc::new(GitExecutor::new(
        client,
        plan.repo_root.clone(),
        plan.operation,
    ));
    let (summary, results) = run_with_executor(
        plan.repositories.clone(),
        plan.max_threads,
        executor,
        progress,
    );

    info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "sync finished"
    );
    Ok(SyncReport {
        client: client_path,
        summary,
        results,
    })
}

/// Dispatches `repos` through `executor` and tracks progress. Separated from
/// `run_sync` so the scheduling can run against any executor.
pub fn run_with_executor(
    repos: Vec<RepoDescriptor>,
    max_threads: usize,
    executor: Arc<dyn RepoExecutor>,
    mut progress: Option<&mut SyncProgressReporter<'_>>,
) -> (FinalSummary, Vec<JobResult>) {
    let mut tracker = ProgressTracker::new(repos.len());
    let results = run_dispatch(repos, max_threads, executor, |event| match event {
        DispatchEvent::Started { name } => {
            debug!(repo = %name, "started");
            if let Some(report) = progress.as_deref_mut() {
                report(SyncProgress::Started {
                    name,
                    snapshot: tracker.snapshot(),
                });
            }
        }
        DispatchEvent::Finished(result) => {
            let snapshot = tracker.on_result(result);
            if result.success {
                info!(
                    repo = %result.name,
                    action = result.action.as_str(),
                    completed = snapshot.completed,
                    total = snapshot.total,
                    "repository done"
                );
            } else {
                warn!(
                    repo = %result.name,
                    error = result.error_detail.as_deref().unwrap_or("unknown"),
                    completed = snapshot.completed,
                    total = snapshot.total,
                    "repository failed"
                );
            }
            if let Some(report) = progress.as_deref_mut() {
                report(SyncProgress::Finished { result, snapshot });
            }
        }
    });
    (tracker.summary(), results)
}
