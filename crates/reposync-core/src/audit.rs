use crate::config::default_audit_dir;
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

const MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Appends one JSON line per event to `audit-<yyyymmdd>[-n].jsonl`.
///
/// A disabled logger still hands out audit ids but writes nothing, so a
/// missing data directory never stops a command.
#[derive(Clone)]
pub struct AuditLogger {
    session_id: String,
    sink: Option<AuditSink>,
}

#[derive(Clone)]
struct AuditSink {
    dir: PathBuf,
    max_bytes: u64,
}

impl AuditLogger {
    pub fn new() -> anyhow::Result<Self> {
        Self::new_with_dir(default_audit_dir()?, MAX_BYTES)
    }

    pub fn new_with_dir(dir: PathBuf, max_bytes: u64) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("create audit dir {}", dir.display()))?;
        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            sink: Some(AuditSink { dir, max_bytes }),
        })
    }

    pub fn disabled() -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            sink: None,
        }
    }

    /// Writes `record` and returns its audit id.
    pub fn record(&self, record: AuditRecord<'_>) -> anyhow::Result<String> {
        let audit_id = Uuid::new_v4().to_string();
        let Some(sink) = &self.sink else {
            return Ok(audit_id);
        };
        let now = OffsetDateTime::now_utc();
        let line = serde_json::to_string(&AuditLine {
            ts: now.format(&Rfc3339).context("format timestamp")?,
            level: record.status.level(),
            event: record.event,
            audit_id: &audit_id,
            session_id: &self.session_id,
            status: record.status.as_str(),
            command: record.command,
            repo: record.context.repo.as_deref(),
            path: record.context.path.as_deref(),
            mode: record.context.mode.as_deref(),
            error: record.error.as_deref(),
            details: record.details.as_ref(),
        })
        .context("serialize audit entry")?;

        let date = format!("{:04}{:02}{:02}", now.year(), u8::from(now.month()), now.day());
        let path = sink.file_for(&date);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open audit log {}", path.display()))?;
        writeln!(file, "{line}").context("write audit entry")?;
        Ok(audit_id)
    }
}

impl AuditSink {
    /// First file for `date` still under the size cap.
    fn file_for(&self, date: &str) -> PathBuf {
        (0u32..)
            .map(|part| audit_file(&self.dir, date, part))
            .find(|path| {
                fs::metadata(path)
                    .map(|metadata| metadata.len() < self.max_bytes)
                    .unwrap_or(true)
            })
            .unwrap_or_else(|| audit_file(&self.dir, date, 0))
    }
}

fn audit_file(dir: &Path, date: &str, part: u32) -> PathBuf {
    if part == 0 {
        dir.join(format!("audit-{date}.jsonl"))
    } else {
        dir.join(format!("audit-{date}-{part}.jsonl"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Failed,
    Skipped,
}

impl AuditStatus {
    fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Ok => "ok",
            AuditStatus::Failed => "failed",
            AuditStatus::Skipped => "skipped",
        }
    }

    fn level(self) -> &'static str {
        match self {
            AuditStatus::Ok => "INFO",
            AuditStatus::Failed => "ERROR",
            AuditStatus::Skipped => "WARN",
        }
    }
}

/// Where an event happened; every field is optional.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub repo: Option<String>,
    pub path: Option<String>,
    pub mode: Option<String>,
}

/// One event to be written by [`AuditLogger::record`].
#[derive(Debug, Clone)]
pub struct AuditRecord<'a> {
    event: &'a str,
    status: AuditStatus,
    command: Option<&'a str>,
    context: AuditContext,
    details: Option<Value>,
    error: Option<String>,
}

impl<'a> AuditRecord<'a> {
    pub fn new(event: &'a str, status: AuditStatus) -> Self {
        Self {
            event,
            status,
            command: None,
            context: AuditContext::default(),
            details: None,
            error: None,
        }
    }

    pub fn command(mut self, command: &'a str) -> Self {
        self.command = Some(command);
        self
    }

    pub fn context(mut self, context: AuditContext) -> Self {
        self.context = context;
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[derive(Serialize)]
struct AuditLine<'a> {
    ts: String,
    level: &'static str,
    event: &'a str,
    audit_id: &'a str,
    session_id: &'a str,
    status: &'static str,
    command: Option<&'a str>,
    repo: Option<&'a str>,
    path: Option<&'a str>,
    mode: Option<&'a str>,
    error: Option<&'a str>,
    details: Option<&'a Value>,
}
