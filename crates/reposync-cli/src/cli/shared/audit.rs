use super::*;

/// Opens the audit log, falling back to a disabled logger when the data
/// directory is unusable.
pub(in crate::cli) fn open_audit_log() -> AuditLogger {
    match AuditLogger::new() {
        Ok(audit) => audit,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "audit log unavailable; continuing without it");
            AuditLogger::disabled()
        }
    }
}

/// Writes one audit entry. A failed write is logged and never fails the
/// command.
pub(in crate::cli) fn record_audit(audit: &AuditLogger, record: AuditRecord<'_>) -> Option<String> {
    match audit.record(record) {
        Ok(audit_id) => Some(audit_id),
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed to write audit entry");
            None
        }
    }
}

pub(in crate::cli) fn print_audit_id(audit_id: Option<&str>) {
    if let Some(audit_id) = audit_id {
        println!("Audit ID: {audit_id}");
    }
}
