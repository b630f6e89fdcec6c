use crate::logging;
use anyhow::Context;
use clap::{Parser, ValueEnum};
use reposync_core::audit::{AuditContext, AuditLogger, AuditRecord, AuditStatus};
use reposync_core::config::{AppConfig, default_config_path, default_lock_dir, default_repo_root};
use reposync_core::locator::ClientLocator;
use reposync_core::model::{JobResult, OperationMode, RepoDescriptor};
use reposync_core::sync_engine::{SyncPlan, SyncProgress, run_sync};
use reposync_core::tracker::{FinalSummary, render_progress_line, render_summary_table};
use std::cell::Cell;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

mod app;
mod args;
mod config_cmd;
mod repo_cmd;
mod shared;
mod status_cmd;
mod sync_cmd;

use args::*;
use shared::*;

use config_cmd::handle_config;
use repo_cmd::handle_repo;
use status_cmd::handle_status;
use sync_cmd::handle_sync;

pub fn run() -> anyhow::Result<()> {
    app::run()
}
