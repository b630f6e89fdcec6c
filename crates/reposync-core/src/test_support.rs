use crate::locator::ClientLocator;
use git2::{Oid, Repository, Signature};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Git executable for tests that shell out; `None` skips the test.
pub(crate) fn locate_git() -> Option<PathBuf> {
    ClientLocator::from_env(None).resolve().ok()
}

/// Creates a non-bare repository with one commit to act as the remote.
pub(crate) fn init_upstream(dir: &Path) -> Repository {
    let repo = Repository::init(dir).unwrap();
    commit_file(&repo, "README.md", "hello\n");
    repo
}

/// Commits `name` on top of HEAD (or as the root commit).
pub(crate) fn commit_file(repo: &Repository, name: &str, contents: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(name), contents).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(name)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("tester", "tester@example.com").unwrap();
    let parent = repo
        .head()
        .ok()
        .and_then(|head| head.target())
        .map(|oid| repo.find_commit(oid).unwrap());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, &format!("add {name}"), &tree, &parents)
        .unwrap()
}

/// Runs git and asserts success, returning trimmed stdout.
pub(crate) fn git(git: &Path, cwd: &Path, args: &[&str]) -> String {
    let output = Command::new(git)
        .args(args)
        .current_dir(cwd)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Clones `upstream` into `dest` and gives it a committer identity.
pub(crate) fn clone_fixture(git_path: &Path, upstream: &Path, dest: &Path) {
    let parent = dest.parent().unwrap();
    std::fs::create_dir_all(parent).unwrap();
    git(
        git_path,
        parent,
        &[
            "clone",
            upstream.to_str().unwrap(),
            dest.file_name().unwrap().to_str().unwrap(),
        ],
    );
    set_identity(git_path, dest);
}

pub(crate) fn set_identity(git_path: &Path, repo: &Path) {
    git(git_path, repo, &["config", "user.name", "tester"]);
    git(git_path, repo, &["config", "user.email", "tester@example.com"]);
}
