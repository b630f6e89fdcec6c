use super::*;
use reposync_core::repo_status::RepoLocalStatus;

pub(in crate::cli) fn stdout_is_tty() -> bool {
    io::stdout().is_terminal()
}

/// Rewrites one progress line in place, padding over a longer previous line.
pub(in crate::cli) fn render_sync_progress(line: &str, last_len: &Cell<usize>, done: bool) {
    let prev_len = last_len.get();
    if line.len() < prev_len {
        print!("\r{line}{}", " ".repeat(prev_len - line.len()));
    } else {
        print!("\r{line}");
    }
    let _ = io::stdout().flush();
    last_len.set(line.len());
    if done {
        println!();
        last_len.set(0);
    }
}

pub(in crate::cli) fn print_failures(summary: &FinalSummary) {
    if summary.failures.is_empty() {
        return;
    }
    println!("Failed repositories:");
    for failure in &summary.failures {
        println!("  {}: {}", failure.name, failure.detail);
    }
}

pub(in crate::cli) fn print_warnings(results: &[JobResult]) {
    let mut any = false;
    for result in results {
        for warning in &result.warnings {
            if !any {
                println!("Warnings:");
                any = true;
            }
            println!("  {}: {warning}", result.name);
        }
    }
}

pub(in crate::cli) fn print_log_entries(warnings: &logging::WarningLog) {
    let events = warnings.snapshot();
    if events.is_empty() {
        return;
    }
    println!("Recent log warnings:");
    for event in events {
        println!("  {}", event.line);
    }
}

pub(in crate::cli) fn format_status_row(status: &RepoLocalStatus) -> String {
    let branch = status.head_branch.as_deref().unwrap_or("-");
    let upstream = status.upstream.as_deref().unwrap_or("-");
    let divergence = match (status.ahead, status.behind) {
        (Some(ahead), Some(behind)) => format!("+{ahead}/-{behind}"),
        _ => "-".to_string(),
    };
    format!(
        "{} | {} | {} | {} | {}",
        status.name,
        status.state.as_str(),
        branch,
        upstream,
        divergence
    )
}
