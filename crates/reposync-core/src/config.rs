use crate::model::RepoDescriptor;
use crate::paths::validate_repositories;
use anyhow::Context;
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_MAX_THREADS: usize = 4;
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub repo_root: Option<PathBuf>,
    #[serde(default)]
    pub max_threads: Option<usize>,
    #[serde(default)]
    pub operation_timeout_secs: Option<u64>,
    #[serde(default)]
    pub vcs_path: Option<PathBuf>,
    #[serde(default)]
    pub repositories: Vec<RepoDescriptor>,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: AppConfig = serde_json::from_str(&data).context("parse config")?;
        validate_repositories(&config.repositories).context("validate config repositories")?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads.unwrap_or(DEFAULT_MAX_THREADS)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(
            self.operation_timeout_secs
                .unwrap_or(DEFAULT_OPERATION_TIMEOUT_SECS),
        )
    }

    /// Adds a repository, rejecting names that would break list validity.
    pub fn add_repository(&mut self, repo: RepoDescriptor) -> anyhow::Result<()> {
        let mut repositories = self.repositories.clone();
        repositories.push(repo);
        validate_repositories(&repositories)?;
        self.repositories = repositories;
        Ok(())
    }

    pub fn remove_repository(&mut self, name: &str) -> bool {
        let before = self.repositories.len();
        self.repositories.retain(|repo| repo.name != name);
        self.repositories.len() != before
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "reposync", "reposync").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_lock_dir() -> anyhow::Result<PathBuf> {
    let project = project_dirs()?;
    Ok(project
        .runtime_dir()
        .unwrap_or(project.cache_dir())
        .join("locks"))
}

pub fn default_audit_dir() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.data_local_dir().join("audit"))
}

pub fn default_repo_root() -> anyhow::Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home directory")?;
    Ok(base.home_dir().join("repos"))
}
