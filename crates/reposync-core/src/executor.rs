use crate::errors::RepoError;
use crate::git_client::GitClient;
use crate::model::{JobResult, OperationMode, RepoAction, RepoDescriptor};
use crate::paths::{has_working_copy, repo_path};
use crate::shelf::{self, Shelf, ShelfGuard};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Brings one working copy into the requested state. Implementations never
/// return errors; every failure is folded into the `JobResult`.
pub trait RepoExecutor: Send + Sync {
    fn execute(&self, repo: &RepoDescriptor) -> JobResult;
}

pub struct GitExecutor {
    client: GitClient,
    repo_root: PathBuf,
    mode: OperationMode,
}

impl GitExecutor {
    pub fn new(client: GitClient, repo_root: PathBuf, mode: OperationMode) -> Self {
        Self {
            client,
            repo_root,
            mode,
        }
    }

    fn execute_at(&self, repo: &RepoDescriptor, path: &Path) -> JobResult {
        let present = has_working_copy(path);

        if self.mode.clones() && !present {
            return match self.clone_repo(repo, path) {
                Ok(()) => JobResult::succeeded(&repo.name, RepoAction::Cloned),
                Err(err) => failed_result(repo, err),
            };
        }

        if !self.mode.updates() {
            debug!(repo = %repo.name, "working copy present; nothing to clone");
            return JobResult::succeeded(&repo.name, RepoAction::Skipped);
        }

        if !present {
            warn!(repo = %repo.name, path = %path.display(), "no working copy to update");
            return JobResult::succeeded(&repo.name, RepoAction::Skipped).with_warning(format!(
                "no working copy at {}; run a clone first",
                path.display()
            ));
        }

        self.update_repo(repo, path)
    }

    fn clone_repo(&self, repo: &RepoDescriptor, path: &Path) -> Result<(), RepoError> {
        let existed = path.exists();
        if existed && !dir_is_empty(path) {
            return Err(RepoError::CloneFailed(format!(
                "{} exists and is not a working copy",
                path.display()
            )));
        }

        info!(repo = %repo.name, url = %repo.url, "cloning");
        let result = self
            .client
            .run_network(
                &self.repo_root,
                &[
                    "clone",
                    "--recurse-submodules",
                    "--",
                    repo.url.as_str(),
                    repo.name.as_str(),
                ],
            )
            .map_err(|err| RepoError::CloneFailed(err.to_string()))
            .and_then(|output| {
                if output.success() {
                    Ok(())
                } else {
                    Err(RepoError::CloneFailed(output.detail()))
                }
            });

        if result.is_err() && !existed && path.exists() {
            if let Err(err) = fs::remove_dir_all(path) {
                warn!(
                    repo = %repo.name,
                    path = %path.display(),
                    error = %err,
                    "failed to remove partial clone"
                );
            }
        }
        result
    }

    fn update_repo(&self, repo: &RepoDescriptor, path: &Path) -> JobResult {
        let dirty = match shelf::is_dirty(&self.client, path) {
            Ok(dirty) => dirty,
            Err(err) => return failed_result(repo, err),
        };
        let shelf = if dirty {
            match shelf::shelve(&self.client, path, &repo.name) {
                Ok(shelf) => shelf,
                Err(err) => return failed_result(repo, err),
            }
        } else {
            None
        };
        let shelved = shelf.is_some();

        let guard = ShelfGuard::new(&self.client, path, shelf);
        let mut warnings = Vec::new();
        let outcome = self.sync_working_copy(repo, path, guard.shelf(), &mut warnings);
        let restored = guard.restore();

        let mut result = match (outcome, restored) {
            (Ok(action), Ok(())) => JobResult::succeeded(&repo.name, action),
            (Ok(_), Err(restore_err)) => failed_result(repo, restore_err),
            (Err(err), Ok(())) => failed_result(repo, err),
            (Err(err), Err(restore_err)) => {
                let mut result = failed_result(repo, err);
                result.error_detail = result
                    .error_detail
                    .map(|detail| format!("{detail}; {}: {restore_err}", restore_err.kind()));
                result
            }
        };
        result.warnings.extend(warnings);
        result.shelved = shelved;
        result
    }

    fn sync_working_copy(
        &self,
        repo: &RepoDescriptor,
        path: &Path,
        shelf: Option<&Shelf>,
        warnings: &mut Vec<String>,
    ) -> Result<RepoAction, RepoError> {
        self.fetch(repo, path)?;

        let action = match self.upstream(path)? {
            Some(upstream) => self.fast_forward(repo, path, &upstream, shelf)?,
            None => {
                warn!(repo = %repo.name, "no upstream configured; leaving branch as-is");
                warnings.push("NoUpstreamConfigured: current branch has no upstream".to_string());
                RepoAction::Skipped
            }
        };

        self.update_submodules(repo, path)?;
        Ok(action)
    }

    fn fetch(&self, repo: &RepoDescriptor, path: &Path) -> Result<(), RepoError> {
        info!(repo = %repo.name, "fetching");
        let output = self
            .client
            .run_network(path, &["fetch", "--all", "--prune"])
            .map_err(|err| RepoError::FetchFailed(err.to_string()))?;
        if !output.success() {
            return Err(RepoError::FetchFailed(output.detail()));
        }
        Ok(())
    }

    fn upstream(&self, path: &Path) -> Result<Option<String>, RepoError> {
        let output = self
            .client
            .run(
                path,
                &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            )
            .map_err(|err| RepoError::StatusFailed(err.to_string()))?;
        let upstream = output.stdout.trim();
        if output.success() && !upstream.is_empty() {
            Ok(Some(upstream.to_string()))
        } else {
            Ok(None)
        }
    }

    fn fast_forward(
        &self,
        repo: &RepoDescriptor,
        path: &Path,
        upstream: &str,
        shelf: Option<&Shelf>,
    ) -> Result<RepoAction, RepoError> {
        let range = format!("HEAD...{upstream}");
        let counts = self
            .client
            .check(path, &["rev-list", "--left-right", "--count", range.as_str()])
            .map_err(|err| RepoError::FastForwardRejected(err.to_string()))?;
        let (ahead, behind) = parse_ahead_behind(&counts).ok_or_else(|| {
            RepoError::FastForwardRejected(format!("unexpected rev-list output {counts:?}"))
        })?;

        if behind == 0 {
            if ahead > 0 {
                debug!(repo = %repo.name, ahead, "local branch ahead of upstream");
            }
            return Ok(RepoAction::UpToDate);
        }
        if ahead > 0 {
            return Err(RepoError::FastForwardRejected(format!(
                "local branch diverged from {upstream} ({ahead} ahead, {behind} behind)"
            )));
        }

        if let Some(shelf) = shelf {
            let conflicts = self.shelf_conflicts(path, upstream, shelf)?;
            if !conflicts.is_empty() {
                return Err(RepoError::FastForwardRejected(format!(
                    "local changes to {} would be overwritten by {upstream}",
                    conflicts.join(", ")
                )));
            }
        }

        info!(repo = %repo.name, upstream = %upstream, behind, "fast-forwarding");
        let output = self
            .client
            .run(path, &["merge", "--ff-only", upstream])
            .map_err(|err| RepoError::FastForwardRejected(err.to_string()))?;
        if !output.success() {
            return Err(RepoError::FastForwardRejected(output.detail()));
        }
        Ok(RepoAction::FastForwarded)
    }

    /// Shelved paths the incoming commits also touch. Restoring over those
    /// would conflict, so the update is refused instead.
    fn shelf_conflicts(
        &self,
        path: &Path,
        upstream: &str,
        shelf: &Shelf,
    ) -> Result<Vec<String>, RepoError> {
        let local = shelf::shelved_paths(&self.client, path, shelf)?;
        let incoming = self
            .client
            .check(path, &["diff", "--name-only", "--no-renames", "HEAD", upstream])
            .map_err(|err| RepoError::FastForwardRejected(err.to_string()))?;
        let incoming: Vec<String> = incoming.lines().map(str::to_string).collect();
        Ok(overlapping_paths(&local, &incoming))
    }

    fn update_submodules(&self, repo: &RepoDescriptor, path: &Path) -> Result<(), RepoError> {
        if !path.join(".gitmodules").exists() {
            return Ok(());
        }
        info!(repo = %repo.name, "updating submodules");
        let output = self
            .client
            .run_network(path, &["submodule", "update", "--init", "--recursive"])
            .map_err(|err| RepoError::SubmoduleUpdateFailed(err.to_string()))?;
        if !output.success() {
            return Err(RepoError::SubmoduleUpdateFailed(output.detail()));
        }
        Ok(())
    }
}

impl RepoExecutor for GitExecutor {
    fn execute(&self, repo: &RepoDescriptor) -> JobResult {
        let started = Instant::now();
        let path = repo_path(&self.repo_root, &repo.name);
        let mut result = self.execute_at(repo, &path);
        result.duration = started.elapsed();
        result
    }
}

fn failed_result(repo: &RepoDescriptor, err: RepoError) -> JobResult {
    warn!(repo = %repo.name, kind = %err.kind(), error = %err, "repository failed");
    JobResult::failed(&repo.name, err.kind(), &err)
}

fn parse_ahead_behind(counts: &str) -> Option<(u32, u32)> {
    let mut parts = counts.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

/// Paths present in both lists, counting a file against a directory that
/// contains it.
fn overlapping_paths(local: &[String], incoming: &[String]) -> Vec<String> {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    let mut overlap: Vec<String> = local
        .iter()
        .filter(|mine| {
            incoming.iter().any(|theirs| {
                mine.as_str() == theirs.as_str()
                    || nested(mine.as_str(), theirs.as_str())
                    || nested(theirs.as_str(), mine.as_str())
            })
        })
        .cloned()
        .collect();
    overlap.sort();
    overlap.dedup();
    overlap
}

fn dir_is_empty(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FailureKind;
    use crate::test_support::{clone_fixture, commit_file, git, init_upstream, locate_git};
    use git2::Repository;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        git: PathBuf,
        root: PathBuf,
        upstream: PathBuf,
    }

    impl Fixture {
        fn new() -> Option<Self> {
            let git = locate_git()?;
            let tmp = TempDir::new().unwrap();
            let upstream = tmp.path().join("upstream");
            init_upstream(&upstream);
            let root = tmp.path().join("root");
            fs::create_dir_all(&root).unwrap();
            Some(Self {
                _tmp: tmp,
                git,
                root,
                upstream,
            })
        }

        fn executor(&self, mode: OperationMode) -> GitExecutor {
            GitExecutor::new(
                GitClient::new(self.git.clone(), None),
                self.root.clone(),
                mode,
            )
        }

        /// Local submodule URLs use the file transport, which git refuses by default.
        fn submodule_executor(&self) -> GitExecutor {
            GitExecutor::new(
                GitClient::new(self.git.clone(), None).with_config("protocol.file.allow", "always"),
                self.root.clone(),
                OperationMode::UpdateOnly,
            )
        }

        /// Commits `lib` as a submodule of the upstream; returns the new head.
        fn add_submodule(&self, lib: &Path) -> String {
            init_upstream(lib);
            git(
                &self.git,
                &self.upstream,
                &[
                    "-c",
                    "protocol.file.allow=always",
                    "submodule",
                    "add",
                    "-q",
                    lib.to_str().unwrap(),
                    "lib",
                ],
            );
            git(
                &self.git,
                &self.upstream,
                &[
                    "-c",
                    "user.name=tester",
                    "-c",
                    "user.email=tester@example.com",
                    "commit",
                    "-q",
                    "-m",
                    "add lib",
                ],
            );
            git(&self.git, &self.upstream, &["rev-parse", "HEAD"])
        }

        fn descriptor(&self, name: &str) -> RepoDescriptor {
            RepoDescriptor::new(name, self.upstream.to_str().unwrap())
        }

        fn working_copy(&self, name: &str) -> PathBuf {
            let path = self.root.join(name);
            clone_fixture(&self.git, &self.upstream, &path);
            path
        }

        fn head(&self, path: &Path) -> String {
            git(&self.git, path, &["rev-parse", "HEAD"])
        }
    }

    #[test]
    fn parses_rev_list_counts() {
        assert_eq!(parse_ahead_behind("2\t5"), Some((2, 5)));
        assert_eq!(parse_ahead_behind("0 0\n"), Some((0, 0)));
        assert_eq!(parse_ahead_behind("garbage"), None);
    }

    #[test]
    fn overlap_counts_files_inside_directories() {
        let local = vec![
            "README.md".to_string(),
            "lib".to_string(),
            "src/a.rs".to_string(),
        ];
        let incoming = vec![
            "lib/x.rs".to_string(),
            "src/a.rs".to_string(),
            "other.txt".to_string(),
        ];
        assert_eq!(overlapping_paths(&local, &incoming), vec!["lib", "src/a.rs"]);
        assert!(overlapping_paths(&["lib2".to_string()], &["lib/x".to_string()]).is_empty());
    }

    #[test]
    fn clone_only_creates_working_copy() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let result = fx
            .executor(OperationMode::CloneOnly)
            .execute(&fx.descriptor("alpha"));
        assert!(result.success, "{:?}", result.error_detail);
        assert_eq!(result.action, RepoAction::Cloned);
        assert!(has_working_copy(&fx.root.join("alpha")));
        assert!(fx.root.join("alpha").join("README.md").exists());

        let again = fx
            .executor(OperationMode::CloneOnly)
            .execute(&fx.descriptor("alpha"));
        assert!(again.success);
        assert_eq!(again.action, RepoAction::Skipped);
    }

    #[test]
    fn unreachable_url_fails_clone_without_leftovers() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let missing = fx.root.join("..").join("does-not-exist");
        let repo = RepoDescriptor::new("broken", missing.to_str().unwrap());
        let result = fx.executor(OperationMode::CloneOnly).execute(&repo);
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::CloneFailed));
        assert!(
            result
                .error_detail
                .as_deref()
                .unwrap()
                .starts_with("CloneFailed:")
        );
        assert!(!fx.root.join("broken").exists());
    }

    #[test]
    fn clone_refuses_non_empty_plain_directory() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let target = fx.root.join("occupied");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("keep.txt"), "mine").unwrap();
        let result = fx
            .executor(OperationMode::CloneAndUpdate)
            .execute(&fx.descriptor("occupied"));
        assert_eq!(result.failure, Some(FailureKind::CloneFailed));
        assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "mine");
    }

    #[test]
    fn update_only_skips_absent_working_copy() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("ghost"));
        assert!(result.success);
        assert_eq!(result.action, RepoAction::Skipped);
        assert_eq!(result.warnings.len(), 1);
        assert!(!fx.root.join("ghost").exists());
    }

    #[test]
    fn update_only_is_idempotent_on_clean_repo() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let before = fx.head(&path);
        let executor = fx.executor(OperationMode::UpdateOnly);

        let first = executor.execute(&fx.descriptor("alpha"));
        let second = executor.execute(&fx.descriptor("alpha"));
        assert!(first.success, "{:?}", first.error_detail);
        assert!(second.success, "{:?}", second.error_detail);
        assert_eq!(first.action, RepoAction::UpToDate);
        assert_eq!(second.action, RepoAction::UpToDate);
        assert_eq!(fx.head(&path), before);
        assert_eq!(git(&fx.git, &path, &["status", "--porcelain"]), "");
    }

    #[test]
    fn update_fast_forwards_and_restores_local_changes() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let upstream = Repository::open(&fx.upstream).unwrap();
        let new_head = commit_file(&upstream, "CHANGELOG.md", "v2\n");

        fs::write(path.join("README.md"), "local edit\n").unwrap();
        fs::write(path.join("scratch.txt"), "untracked\n").unwrap();

        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("alpha"));
        assert!(result.success, "{:?}", result.error_detail);
        assert_eq!(result.action, RepoAction::FastForwarded);
        assert!(result.shelved);
        assert_eq!(fx.head(&path), new_head.to_string());
        assert_eq!(fs::read_to_string(path.join("README.md")).unwrap(), "local edit\n");
        assert_eq!(fs::read_to_string(path.join("scratch.txt")).unwrap(), "untracked\n");
        assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
    }

    #[test]
    fn diverged_branch_is_rejected_and_changes_restored() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let upstream = Repository::open(&fx.upstream).unwrap();
        commit_file(&upstream, "remote.txt", "remote\n");
        let local = Repository::open(&path).unwrap();
        let local_head = commit_file(&local, "local.txt", "local\n");

        fs::write(path.join("README.md"), "uncommitted\n").unwrap();

        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("alpha"));
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::FastForwardRejected));
        assert!(
            result
                .error_detail
                .as_deref()
                .unwrap()
                .starts_with("FastForwardRejected:")
        );
        assert!(result.shelved);
        assert_eq!(fx.head(&path), local_head.to_string());
        assert_eq!(fs::read_to_string(path.join("README.md")).unwrap(), "uncommitted\n");
        assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
    }

    #[test]
    fn missing_upstream_is_advisory() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        git(&fx.git, &path, &["checkout", "-q", "-b", "local-only"]);
        let before = fx.head(&path);

        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("alpha"));
        assert!(result.success, "{:?}", result.error_detail);
        assert_eq!(result.action, RepoAction::Skipped);
        assert!(
            result
                .warnings
                .iter()
                .any(|warning| warning.starts_with("NoUpstreamConfigured"))
        );
        assert_eq!(fx.head(&path), before);
    }

    #[test]
    fn fetch_failure_still_restores_changes() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let gone = fx.root.join("..").join("moved-away");
        git(
            &fx.git,
            &path,
            &["remote", "set-url", "origin", gone.to_str().unwrap()],
        );
        fs::write(path.join("README.md"), "keep me\n").unwrap();

        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("alpha"));
        assert_eq!(result.failure, Some(FailureKind::FetchFailed));
        assert_eq!(fs::read_to_string(path.join("README.md")).unwrap(), "keep me\n");
        assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
    }

    #[test]
    fn upstream_change_to_shelved_file_is_rejected_cleanly() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let before = fx.head(&path);
        let upstream = Repository::open(&fx.upstream).unwrap();
        commit_file(&upstream, "README.md", "remote change\n");
        fs::write(path.join("README.md"), "local change\n").unwrap();

        let executor = fx.executor(OperationMode::UpdateOnly);
        for _ in 0..2 {
            let result = executor.execute(&fx.descriptor("alpha"));
            assert_eq!(result.failure, Some(FailureKind::FastForwardRejected));
            assert!(result.error_detail.as_deref().unwrap().contains("README.md"));
            assert!(result.shelved);
            assert_eq!(fx.head(&path), before);
            assert_eq!(
                fs::read_to_string(path.join("README.md")).unwrap(),
                "local change\n"
            );
            assert_eq!(git(&fx.git, &path, &["status", "--porcelain"]), "M README.md");
            assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
        }
    }

    #[test]
    fn incoming_file_matching_untracked_file_is_rejected() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let before = fx.head(&path);
        let upstream = Repository::open(&fx.upstream).unwrap();
        commit_file(&upstream, "new.txt", "remote\n");
        fs::write(path.join("new.txt"), "mine\n").unwrap();

        let result = fx
            .executor(OperationMode::UpdateOnly)
            .execute(&fx.descriptor("alpha"));
        assert_eq!(result.failure, Some(FailureKind::FastForwardRejected));
        assert!(result.error_detail.as_deref().unwrap().contains("new.txt"));
        assert_eq!(fx.head(&path), before);
        assert_eq!(fs::read_to_string(path.join("new.txt")).unwrap(), "mine\n");
        assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
    }

    #[test]
    fn submodules_are_initialised_after_fast_forward() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let lib = fx.root.with_file_name("lib-upstream");
        let new_head = fx.add_submodule(&lib);
        fs::write(path.join("notes.txt"), "local\n").unwrap();

        let result = fx.submodule_executor().execute(&fx.descriptor("alpha"));
        assert!(result.success, "{:?}", result.error_detail);
        assert_eq!(result.action, RepoAction::FastForwarded);
        assert_eq!(fx.head(&path), new_head);
        assert_eq!(
            fs::read_to_string(path.join("lib").join("README.md")).unwrap(),
            "hello\n"
        );
        assert_eq!(fs::read_to_string(path.join("notes.txt")).unwrap(), "local\n");
    }

    #[test]
    fn broken_submodule_fails_and_restores_changes() {
        let Some(fx) = Fixture::new() else {
            return;
        };
        let path = fx.working_copy("alpha");
        let lib = fx.root.with_file_name("lib-upstream");
        let new_head = fx.add_submodule(&lib);
        fs::rename(&lib, fx.root.with_file_name("lib-moved")).unwrap();
        fs::write(path.join("notes.txt"), "local\n").unwrap();

        let result = fx.submodule_executor().execute(&fx.descriptor("alpha"));
        assert!(!result.success);
        assert_eq!(result.failure, Some(FailureKind::SubmoduleUpdateFailed));
        assert!(result.shelved);
        assert_eq!(fx.head(&path), new_head);
        assert_eq!(fs::read_to_string(path.join("notes.txt")).unwrap(), "local\n");
        assert_eq!(git(&fx.git, &path, &["stash", "list"]), "");
    }
}
