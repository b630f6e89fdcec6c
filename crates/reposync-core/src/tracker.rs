use crate::model::JobResult;
use serde::Serialize;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub estimated_remaining: Option<Duration>,
}

impl ProgressSnapshot {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

/// Linear estimate from the average time per completed repository.
/// `None` while nothing has completed yet.
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
    if completed >= total {
        return Some(Duration::ZERO);
    }
    if completed == 0 {
        return None;
    }
    let per_repo = elapsed.as_secs_f64() / completed as f64;
    let remaining = (per_repo * (total - completed) as f64).round();
    Some(Duration::from_secs(remaining as u64))
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedRepo {
    pub name: String,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub warnings: usize,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub failures: Vec<FailedRepo>,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

pub struct ProgressTracker {
    total: usize,
    completed: usize,
    succeeded: usize,
    warnings: usize,
    failures: Vec<FailedRepo>,
    started: Instant,
}

impl ProgressTracker {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: 0,
            succeeded: 0,
            warnings: 0,
            failures: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn on_result(&mut self, result: &JobResult) -> ProgressSnapshot {
        self.completed = (self.completed + 1).min(self.total);
        self.warnings += result.warnings.len();
        if result.success {
            self.succeeded += 1;
        } else {
            self.failures.push(FailedRepo {
                name: result.name.clone(),
                detail: result
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "unknown failure".to_string()),
            });
        }
        self.snapshot()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.started.elapsed())
    }

    pub fn snapshot_at(&self, elapsed: Duration) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failures.len(),
            elapsed,
            estimated_remaining: estimate_remaining(elapsed, self.completed, self.total),
        }
    }

    pub fn summary(&self) -> FinalSummary {
        self.summary_at(self.started.elapsed())
    }

    pub fn summary_at(&self, elapsed: Duration) -> FinalSummary {
        FinalSummary {
            total: self.total,
            succeeded: self.succeeded,
            failed: self.total.saturating_sub(self.succeeded),
            warnings: self.warnings,
            elapsed,
            failures: self.failures.clone(),
        }
    }
}

pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn render_progress_line(snapshot: &ProgressSnapshot, last: Option<&JobResult>) -> String {
    let width = snapshot.total.to_string().len();
    let eta = snapshot
        .estimated_remaining
        .map(format_hms)
        .unwrap_or_else(|| "--:--:--".to_string());
    let mut line = format!(
        "[{:>width$}/{}] {:>3}% eta {}",
        snapshot.completed,
        snapshot.total,
        snapshot.percent(),
        eta,
    );
    if let Some(result) = last {
        let status = if result.success { "ok" } else { "FAILED" };
        line.push_str(&format!(
            " | {status} {} ({})",
            result.name,
            result.action.as_str()
        ));
    }
    line
}

pub fn render_summary_table(summary: &FinalSummary) -> String {
    let rows = [
        ("Total repositories", summary.total.to_string()),
        ("Successful", summary.succeeded.to_string()),
        ("Failed/skipped", summary.failed.to_string()),
        ("Warnings", summary.warnings.to_string()),
        ("Elapsed", format_hms(summary.elapsed)),
    ];
    let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);
    let border = format!(
        "+{}+{}+",
        "-".repeat(label_width + 2),
        "-".repeat(value_width + 2)
    );
    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for (label, value) in rows {
        out.push_str(&format!("| {label:<label_width$} | {value:>value_width$} |\n"));
    }
    out.push_str(&border);
    out
}
