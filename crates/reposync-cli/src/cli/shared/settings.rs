use super::*;

pub(in crate::cli) struct CommandContext<'a> {
    pub(in crate::cli) audit: &'a AuditLogger,
    pub(in crate::cli) config_path: &'a Path,
    pub(in crate::cli) verbose: bool,
    pub(in crate::cli) log_buffer: &'a logging::WarningLog,
}

pub(in crate::cli) fn resolve_config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Flag values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub(in crate::cli) struct SettingsOverrides {
    pub(in crate::cli) repo_root: Option<PathBuf>,
    pub(in crate::cli) max_threads: Option<usize>,
    pub(in crate::cli) timeout_secs: Option<u64>,
    pub(in crate::cli) vcs_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub(in crate::cli) struct EffectiveSettings {
    pub(in crate::cli) repo_root: PathBuf,
    pub(in crate::cli) max_threads: usize,
    pub(in crate::cli) operation_timeout: Duration,
    pub(in crate::cli) vcs_path: Option<PathBuf>,
}

pub(in crate::cli) fn resolve_settings(
    overrides: SettingsOverrides,
    config: &AppConfig,
) -> anyhow::Result<EffectiveSettings> {
    let repo_root = match overrides.repo_root.or_else(|| config.repo_root.clone()) {
        Some(root) => root,
        None => default_repo_root()?,
    };
    let max_threads = overrides.max_threads.unwrap_or_else(|| config.max_threads());
    if max_threads == 0 {
        anyhow::bail!("max threads must be at least 1");
    }
    let operation_timeout = overrides
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.operation_timeout());
    if operation_timeout.is_zero() {
        anyhow::bail!("timeout must be at least 1 second");
    }
    Ok(EffectiveSettings {
        repo_root,
        max_threads,
        operation_timeout,
        vcs_path: overrides.vcs_path.or_else(|| config.vcs_path.clone()),
    })
}

/// Narrows the configured list to the names passed with `--only`, keeping
/// config order. Unknown names are an error rather than a silent no-op.
pub(in crate::cli) fn select_repositories(
    repositories: &[RepoDescriptor],
    only: &[String],
) -> anyhow::Result<Vec<RepoDescriptor>> {
    if only.is_empty() {
        return Ok(repositories.to_vec());
    }
    let unknown: Vec<&str> = only
        .iter()
        .filter(|name| !repositories.iter().any(|repo| &repo.name == *name))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        anyhow::bail!("unknown repositories: {}", unknown.join(", "));
    }
    Ok(repositories
        .iter()
        .filter(|repo| only.contains(&repo.name))
        .cloned()
        .collect())
}
