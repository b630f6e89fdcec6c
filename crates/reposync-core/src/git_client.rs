use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Error)]
pub enum GitError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for git {command}: {source}")]
    Wait {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("git {command} timed out after {}s", .after.as_secs())]
    TimedOut { command: String, after: Duration },
    #[error("git {command} failed: {detail}")]
    Failed { command: String, detail: String },
}

#[derive(Debug, Clone)]
pub struct GitOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Best single-line explanation of a failed invocation.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.status.code() {
            Some(code) => format!("exit code {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Thin wrapper that runs the git executable with argument arrays.
#[derive(Debug, Clone)]
pub struct GitClient {
    path: PathBuf,
    network_timeout: Option<Duration>,
    config: Vec<String>,
}

impl GitClient {
    pub fn new(path: PathBuf, network_timeout: Option<Duration>) -> Self {
        Self {
            path,
            network_timeout,
            config: Vec::new(),
        }
    }

    /// Passes `-c key=value` ahead of every command run by this client.
    pub fn with_config(mut self, key: &str, value: &str) -> Self {
        self.config.push(format!("{key}={value}"));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> Result<String, GitError> {
        let cwd = std::env::temp_dir();
        self.check(&cwd, &["--version"])
    }

    /// Runs a local git command; the exit status is left for the caller.
    pub fn run(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
        self.run_with_timeout(cwd, args, None)
    }

    /// Runs a git command that talks to a remote, bounded by the network timeout.
    pub fn run_network(&self, cwd: &Path, args: &[&str]) -> Result<GitOutput, GitError> {
        self.run_with_timeout(cwd, args, self.network_timeout)
    }

    /// Runs a local git command and returns trimmed stdout, failing on non-zero exit.
    pub fn check(&self, cwd: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.run(cwd, args)?;
        if !output.success() {
            return Err(GitError::Failed {
                command: args.join(" "),
                detail: output.detail(),
            });
        }
        Ok(output.stdout.trim().to_string())
    }

    pub fn run_with_timeout(
        &self,
        cwd: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<GitOutput, GitError> {
        let command = args.join(" ");
        debug!(cwd = %cwd.display(), command = %command, "running git");
        let mut child = Command::new(&self.path)
            .args(self.config.iter().flat_map(|entry| ["-c", entry.as_str()]))
            .args(args)
            .current_dir(cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| GitError::Spawn {
                program: self.path.clone(),
                source,
            })?;

        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = match timeout {
            None => child.wait().map_err(|source| GitError::Wait {
                command: command.clone(),
                source,
            })?,
            Some(limit) => {
                let deadline = Instant::now() + limit;
                loop {
                    match child.try_wait() {
                        Ok(Some(status)) => break status,
                        Ok(None) if Instant::now() >= deadline => {
                            let _ = child.kill();
                            let _ = child.wait();
                            // Reader threads are left detached; grandchildren
                            // such as remote helpers may still hold the pipes.
                            return Err(GitError::TimedOut {
                                command,
                                after: limit,
                            });
                        }
                        Ok(None) => thread::sleep(POLL_INTERVAL),
                        Err(source) => {
                            let _ = child.kill();
                            return Err(GitError::Wait { command, source });
                        }
                    }
                }
            }
        };

        Ok(GitOutput {
            status,
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
