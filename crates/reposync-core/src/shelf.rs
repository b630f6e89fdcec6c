//! Shelving of uncommitted changes around an update.
//!
//! Changes are pushed onto the stash under a unique message and restored by
//! stash commit id, so an unrelated stash entry is never applied or dropped.

use crate::errors::RepoError;
use crate::git_client::{GitClient, GitOutput};
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub(crate) const STASH_PREFIX: &str = "reposync autostash";

#[derive(Debug, Clone)]
pub(crate) struct Shelf {
    pub(crate) stash_id: String,
    pub(crate) message: String,
}

pub(crate) fn is_dirty(client: &GitClient, path: &Path) -> Result<bool, RepoError> {
    let status = client
        .check(path, &["status", "--porcelain"])
        .map_err(|err| RepoError::StatusFailed(err.to_string()))?;
    Ok(!status.is_empty())
}

pub(crate) fn shelve(
    client: &GitClient,
    path: &Path,
    repo_name: &str,
) -> Result<Option<Shelf>, RepoError> {
    let before = stash_head(client, path)?;
    let message = format!("{STASH_PREFIX} {repo_name} {} {}", stash_timestamp(), Uuid::new_v4());

    let stash_client = with_fallback_identity(client, path);
    let output = stash_client
        .run(
            path,
            &["stash", "push", "--include-untracked", "-m", message.as_str()],
        )
        .map_err(|err| RepoError::ShelveFailed(err.to_string()))?;
    if !output.success() {
        return Err(RepoError::ShelveFailed(output.detail()));
    }

    let after = stash_head(client, path)?;
    match after {
        Some(stash_id) if before.as_deref() != Some(stash_id.as_str()) => {
            info!(path = %path.display(), stash = %stash_id, "shelved local changes");
            Ok(Some(Shelf { stash_id, message }))
        }
        _ => {
            debug!(path = %path.display(), "nothing to shelve");
            Ok(None)
        }
    }
}

/// Applies the shelf back onto the working tree and drops its stash entry.
/// A failed apply is rolled back so the stash stays the only copy of the
/// changes and the tree is left clean for the next run.
pub(crate) fn unshelve(client: &GitClient, path: &Path, shelf: &Shelf) -> Result<(), RepoError> {
    let with_index = apply_stash(client, path, shelf, true)?;
    if !with_index.success() {
        let detail = with_index.detail();
        debug!(
            path = %path.display(),
            detail = %detail,
            "stash apply --index failed; retrying without index"
        );
        discard_partial_apply(client, path, shelf);
        let plain = apply_stash(client, path, shelf, false)?;
        if !plain.success() {
            discard_partial_apply(client, path, shelf);
            return Err(unshelve_error(shelf, &detail));
        }
    }
    info!(path = %path.display(), stash = %shelf.stash_id, "restored shelved changes");
    drop_stash_entry(client, path, shelf);
    Ok(())
}

fn apply_stash(
    client: &GitClient,
    path: &Path,
    shelf: &Shelf,
    with_index: bool,
) -> Result<GitOutput, RepoError> {
    let mut args = vec!["stash", "apply"];
    if with_index {
        args.push("--index");
    }
    args.push(shelf.stash_id.as_str());
    client
        .run(path, &args)
        .map_err(|err| unshelve_error(shelf, &err.to_string()))
}

/// Resets tracked files and removes the untracked files a failed apply wrote.
fn discard_partial_apply(client: &GitClient, path: &Path, shelf: &Shelf) {
    if let Err(err) = client.check(path, &["reset", "--hard", "-q"]) {
        warn!(path = %path.display(), error = %err, "could not reset after failed stash apply");
    }
    let untracked = match untracked_paths(client, path, shelf) {
        Ok(untracked) => untracked,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not list shelved untracked files");
            return;
        }
    };
    if untracked.is_empty() {
        return;
    }
    let mut args = vec!["clean", "-f", "-q", "--"];
    args.extend(untracked.iter().map(String::as_str));
    if let Err(err) = client.check(path, &args) {
        warn!(path = %path.display(), error = %err, "could not remove partially restored files");
    }
}

fn unshelve_error(shelf: &Shelf, detail: &str) -> RepoError {
    RepoError::UnshelveFailed(format!(
        "{detail}; local changes kept in stash \"{}\"",
        shelf.message
    ))
}

/// Every path a restore would write: tracked changes plus the untracked
/// files captured by `--include-untracked`.
pub(crate) fn shelved_paths(
    client: &GitClient,
    path: &Path,
    shelf: &Shelf,
) -> Result<Vec<String>, RepoError> {
    let base = format!("{}^1", shelf.stash_id);
    let tracked = client
        .check(
            path,
            &["diff", "--name-only", "--no-renames", base.as_str(), shelf.stash_id.as_str()],
        )
        .map_err(|err| RepoError::StatusFailed(err.to_string()))?;
    let mut paths: Vec<String> = tracked.lines().map(str::to_string).collect();
    paths.extend(untracked_paths(client, path, shelf)?);
    Ok(paths)
}

fn untracked_paths(client: &GitClient, path: &Path, shelf: &Shelf) -> Result<Vec<String>, RepoError> {
    let untracked = format!("{}^3", shelf.stash_id);
    let exists = client
        .run(path, &["rev-parse", "-q", "--verify", untracked.as_str()])
        .map_err(|err| RepoError::StatusFailed(err.to_string()))?;
    if !exists.success() {
        return Ok(Vec::new());
    }
    let listing = client
        .check(path, &["ls-tree", "-r", "--name-only", untracked.as_str()])
        .map_err(|err| RepoError::StatusFailed(err.to_string()))?;
    Ok(listing.lines().map(str::to_string).collect())
}

fn drop_stash_entry(client: &GitClient, path: &Path, shelf: &Shelf) {
    let listing = match client.check(path, &["stash", "list", "--format=%gd %H"]) {
        Ok(listing) => listing,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "could not list stash after restore");
            return;
        }
    };
    let Some(reference) = find_stash_ref(&listing, &shelf.stash_id) else {
        warn!(path = %path.display(), stash = %shelf.stash_id, "restored stash entry not found");
        return;
    };
    if let Err(err) = client.check(path, &["stash", "drop", reference]) {
        warn!(
            path = %path.display(),
            stash = %reference,
            error = %err,
            "could not drop restored stash entry"
        );
    }
}

fn find_stash_ref<'a>(listing: &'a str, stash_id: &str) -> Option<&'a str> {
    listing.lines().find_map(|line| {
        let (reference, id) = line.split_once(' ')?;
        (id.trim() == stash_id).then_some(reference)
    })
}

fn stash_head(client: &GitClient, path: &Path) -> Result<Option<String>, RepoError> {
    let output = client
        .run(path, &["rev-parse", "-q", "--verify", "refs/stash"])
        .map_err(|err| RepoError::ShelveFailed(err.to_string()))?;
    if output.success() {
        Ok(Some(output.stdout.trim().to_string()))
    } else {
        Ok(None)
    }
}

/// `git stash` creates commits, so a missing committer identity would make it
/// fail; supply a neutral one only when none is configured.
fn with_fallback_identity(client: &GitClient, path: &Path) -> GitClient {
    let configured = |key: &str| {
        client
            .run(path, &["config", "--get", key])
            .map(|output| output.success())
            .unwrap_or(false)
    };
    let mut stash_client = client.clone();
    if !configured("user.name") {
        stash_client = stash_client.with_config("user.name", "reposync");
    }
    if !configured("user.email") {
        stash_client = stash_client.with_config("user.email", "reposync@localhost");
    }
    stash_client
}

fn stash_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    time::format_description::parse("[year][month][day]T[hour][minute][second]Z")
        .ok()
        .and_then(|format| now.format(&format).ok())
        .unwrap_or_else(|| now.unix_timestamp().to_string())
}

/// Holds a shelf until it is restored. Dropping the guard without calling
/// `restore` (an unwinding panic) still attempts the restore.
pub(crate) struct ShelfGuard<'a> {
    client: &'a GitClient,
    path: &'a Path,
    shelf: Option<Shelf>,
}

impl<'a> ShelfGuard<'a> {
    pub(crate) fn new(client: &'a GitClient, path: &'a Path, shelf: Option<Shelf>) -> Self {
        Self {
            client,
            path,
            shelf,
        }
    }

    pub(crate) fn shelf(&self) -> Option<&Shelf> {
        self.shelf.as_ref()
    }

    pub(crate) fn restore(mut self) -> Result<(), RepoError> {
        match self.shelf.take() {
            Some(shelf) => unshelve(self.client, self.path, &shelf),
            None => Ok(()),
        }
    }
}

impl Drop for ShelfGuard<'_> {
    fn drop(&mut self) {
        if let Some(shelf) = self.shelf.take() {
            warn!(path = %self.path.display(), "restoring shelved changes after interrupted update");
            if let Err(err) = unshelve(self.client, self.path, &shelf) {
                error!(path = %self.path.display(), error = %err, "failed to restore shelved changes");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FailureKind;
    use crate::test_support::{clone_fixture, git, init_upstream, locate_git};
    use tempfile::TempDir;

    #[test]
    fn finds_stash_ref_by_commit_id() {
        let listing = "stash@{0} aaaa\nstash@{1} bbbb\n";
        assert_eq!(find_stash_ref(listing, "bbbb"), Some("stash@{1}"));
        assert_eq!(find_stash_ref(listing, "cccc"), None);
    }

    #[test]
    fn shelve_and_unshelve_round_trip() {
        let Some(git_path) = locate_git() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_upstream(&upstream);
        let work = tmp.path().join("work");
        clone_fixture(&git_path, &upstream, &work);

        std::fs::write(work.join("README.md"), "edited\n").unwrap();
        std::fs::write(work.join("notes.txt"), "untracked\n").unwrap();
        let client = GitClient::new(git_path.clone(), None);
        assert!(is_dirty(&client, &work).unwrap());

        let shelf = shelve(&client, &work, "work").unwrap().unwrap();
        assert!(shelf.message.starts_with(STASH_PREFIX));
        assert!(!is_dirty(&client, &work).unwrap());
        assert!(!work.join("notes.txt").exists());

        unshelve(&client, &work, &shelf).unwrap();
        assert_eq!(std::fs::read_to_string(work.join("README.md")).unwrap(), "edited\n");
        assert_eq!(std::fs::read_to_string(work.join("notes.txt")).unwrap(), "untracked\n");
        assert_eq!(git(&git_path, &work, &["stash", "list"]), "");
    }

    #[test]
    fn unrelated_stash_entry_is_left_alone() {
        let Some(git_path) = locate_git() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_upstream(&upstream);
        let work = tmp.path().join("work");
        clone_fixture(&git_path, &upstream, &work);

        std::fs::write(work.join("README.md"), "older work\n").unwrap();
        git(&git_path, &work, &["stash", "push", "-m", "manual"]);

        std::fs::write(work.join("README.md"), "current work\n").unwrap();
        let client = GitClient::new(git_path.clone(), None);
        let shelf = shelve(&client, &work, "work").unwrap().unwrap();
        unshelve(&client, &work, &shelf).unwrap();

        assert_eq!(
            std::fs::read_to_string(work.join("README.md")).unwrap(),
            "current work\n"
        );
        let listing = git(&git_path, &work, &["stash", "list", "--format=%s"]);
        assert_eq!(listing.lines().count(), 1);
        assert!(listing.contains("manual"));
    }

    #[test]
    fn dropped_guard_restores_changes() {
        let Some(git_path) = locate_git() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_upstream(&upstream);
        let work = tmp.path().join("work");
        clone_fixture(&git_path, &upstream, &work);

        std::fs::write(work.join("README.md"), "edited\n").unwrap();
        let client = GitClient::new(git_path, None);
        let shelf = shelve(&client, &work, "work").unwrap();
        {
            let _guard = ShelfGuard::new(&client, &work, shelf);
        }
        assert_eq!(std::fs::read_to_string(work.join("README.md")).unwrap(), "edited\n");
    }

    #[test]
    fn lists_tracked_and_untracked_shelved_paths() {
        let Some(git_path) = locate_git() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_upstream(&upstream);
        let work = tmp.path().join("work");
        clone_fixture(&git_path, &upstream, &work);

        std::fs::write(work.join("README.md"), "edited\n").unwrap();
        std::fs::write(work.join("notes.txt"), "untracked\n").unwrap();
        let client = GitClient::new(git_path, None);
        let shelf = shelve(&client, &work, "work").unwrap().unwrap();

        let mut paths = shelved_paths(&client, &work, &shelf).unwrap();
        paths.sort();
        assert_eq!(paths, vec!["README.md", "notes.txt"]);
        unshelve(&client, &work, &shelf).unwrap();
    }

    #[test]
    fn failed_restore_rolls_back_and_keeps_stash() {
        let Some(git_path) = locate_git() else {
            return;
        };
        let tmp = TempDir::new().unwrap();
        let upstream = tmp.path().join("upstream");
        init_upstream(&upstream);
        let work = tmp.path().join("work");
        clone_fixture(&git_path, &upstream, &work);

        std::fs::write(work.join("README.md"), "local change\n").unwrap();
        std::fs::write(work.join("scratch.txt"), "scratch\n").unwrap();
        let client = GitClient::new(git_path.clone(), None);
        let shelf = shelve(&client, &work, "work").unwrap().unwrap();

        std::fs::write(work.join("README.md"), "committed change\n").unwrap();
        git(&git_path, &work, &["commit", "-q", "-am", "conflicting edit"]);

        let err = unshelve(&client, &work, &shelf).unwrap_err();
        assert_eq!(err.kind(), FailureKind::UnshelveFailed);
        assert!(err.to_string().contains(&shelf.message));

        assert_eq!(git(&git_path, &work, &["status", "--porcelain"]), "");
        assert_eq!(
            std::fs::read_to_string(work.join("README.md")).unwrap(),
            "committed change\n"
        );
        assert!(!work.join("scratch.txt").exists());
        assert_eq!(
            git(&git_path, &work, &["stash", "list"]).lines().count(),
            1
        );
        let kept = format!("{}:README.md", shelf.stash_id);
        assert_eq!(git(&git_path, &work, &["show", kept.as_str()]), "local change");

        let second = shelve(&client, &work, "work").unwrap();
        assert!(second.is_none());
    }
}
