use super::*;
use reposync_core::repo_status::compute_repo_status;
use reposync_core::sync_engine::prepare_client;

pub(super) fn handle_status(args: StatusArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let audit = ctx.audit;
    let result: anyhow::Result<()> = (|| {
        let config = AppConfig::load(ctx.config_path)?;
        let settings = resolve_settings(
            SettingsOverrides {
                repo_root: args.repo_root.clone(),
                vcs_path: args.vcs_path.clone(),
                ..SettingsOverrides::default()
            },
            &config,
        )?;
        if config.repositories.is_empty() {
            println!("No repositories configured.");
            return Ok(());
        }
        let client = prepare_client(
            &ClientLocator::from_env(settings.vcs_path.clone()),
            settings.operation_timeout,
        )?;

        let mut statuses = Vec::with_capacity(config.repositories.len());
        for repo in &config.repositories {
            match compute_repo_status(&client, &settings.repo_root, repo) {
                Ok(status) => statuses.push(status),
                Err(err) => {
                    warn!(repo = %repo.name, error = %err, "Status check failed");
                    if !args.json {
                        println!("{} | error | {err}", repo.name);
                    }
                }
            }
        }

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&statuses).context("serialize statuses")?
            );
        } else {
            println!("Repo root: {}", settings.repo_root.display());
            for status in &statuses {
                println!("{}", format_status_row(status));
            }
        }
        Ok(())
    })();

    let record = match &result {
        Ok(()) => AuditRecord::new("status", AuditStatus::Ok),
        Err(err) => AuditRecord::new("status", AuditStatus::Failed).error(format!("{err:#}")),
    };
    record_audit(audit, record.command("status"));
    result
}
