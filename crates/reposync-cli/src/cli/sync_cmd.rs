use super::*;
pub(super) fn handle_sync(args: SyncArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let audit = ctx.audit;
    let operation: OperationMode = args.operation.into();
    let result: anyhow::Result<()> = (|| {
        let config = AppConfig::load(ctx.config_path)?;
        let settings = resolve_settings(
            SettingsOverrides {
                repo_root: args.repo_root.clone(),
                max_threads: args.max_threads,
                timeout_secs: args.timeout,
                vcs_path: args.vcs_path.clone(),
            },
            &config,
        )?;
        let repositories = select_repositories(&config.repositories, &args.only)?;
        if repositories.is_empty() {
            println!(
                "No repositories configured. Add one with `reposync repo add` ({}).",
                ctx.config_path.display()
            );
            let audit_id = record_audit(
                audit,
                AuditRecord::new("sync.run", AuditStatus::Skipped)
                    .command("sync")
                    .error("no repositories configured"),
            );
            if !args.json {
                print_audit_id(audit_id.as_deref());
            }
            return Ok(());
        }

        let plan = SyncPlan {
            repositories,
            repo_root: settings.repo_root.clone(),
            operation,
            max_threads: settings.max_threads,
            locator: ClientLocator::from_env(settings.vcs_path.clone()),
            operation_timeout: settings.operation_timeout,
            lock_dir: Some(default_lock_dir()?),
        };

        let interactive = stdout_is_tty() && !args.json;
        let last_len = Cell::new(0usize);
        let mut reporter = |progress: SyncProgress<'_>| match progress {
            SyncProgress::Started { snapshot, name } => {
                if interactive {
                    let line = format!("{} | -> {name}", render_progress_line(&snapshot, None));
                    render_sync_progress(&line, &last_len, false);
                }
            }
            SyncProgress::Finished { result, snapshot } => {
                audit_repo_result(audit, &plan.repo_root, operation, result);
                if args.json {
                    return;
                }
                let line = render_progress_line(&snapshot, Some(result));
                if interactive {
                    render_sync_progress(&line, &last_len, snapshot.completed >= snapshot.total);
                } else {
                    println!("{line}");
                }
            }
        };
        let report = run_sync(&plan, Some(&mut reporter))?;

        let details = serde_json::json!({
            "operation": operation.as_str(),
            "total": report.summary.total,
            "succeeded": report.summary.succeeded,
            "failed": report.summary.failed,
            "warnings": report.summary.warnings,
            "elapsed_secs": report.summary.elapsed.as_secs(),
        });
        let status = if report.summary.failed == 0 {
            AuditStatus::Ok
        } else {
            AuditStatus::Failed
        };
        let audit_id = record_audit(
            audit,
            AuditRecord::new("sync.run", status)
                .command("sync")
                .context(AuditContext {
                    repo: None,
                    path: Some(plan.repo_root.display().to_string()),
                    mode: Some(operation.as_str().to_string()),
                })
                .details(details),
        );

        if args.json {
            let output = serde_json::json!({
                "client": report.client,
                "repo_root": plan.repo_root,
                "operation": operation.as_str(),
                "summary": report.summary,
                "results": report.results,
                "audit_id": audit_id,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&output).context("serialize sync report")?
            );
            return Ok(());
        }

        println!("{}", render_summary_table(&report.summary));
        if ctx.verbose {
            print_failures(&report.summary);
            print_warnings(&report.results);
            print_log_entries(ctx.log_buffer);
        } else if report.summary.failed > 0 || report.summary.warnings > 0 {
            println!("Re-run with --verbose for failure details.");
        }
        print_audit_id(audit_id.as_deref());
        Ok(())
    })();

    if let Err(err) = &result {
        record_audit(
            audit,
            AuditRecord::new("sync.run", AuditStatus::Failed)
                .command("sync")
                .error(format!("{err:#}")),
        );
    }
    result
}

fn audit_repo_result(audit: &AuditLogger, root: &Path, operation: OperationMode, result: &JobResult) {
    let status = if !result.success {
        AuditStatus::Failed
    } else if result.warnings.is_empty() {
        AuditStatus::Ok
    } else {
        AuditStatus::Skipped
    };
    let details = serde_json::json!({
        "action": result.action.as_str(),
        "shelved": result.shelved,
        "warnings": result.warnings,
        "duration_ms": result.duration.as_millis() as u64,
    });
    let mut record = AuditRecord::new("sync.repo", status)
        .command("sync")
        .context(AuditContext {
            repo: Some(result.name.clone()),
            path: Some(root.join(&result.name).display().to_string()),
            mode: Some(operation.as_str().to_string()),
        })
        .details(details);
    if let Some(detail) = result.error_detail.as_deref() {
        record = record.error(detail);
    }
    record_audit(audit, record);
}
