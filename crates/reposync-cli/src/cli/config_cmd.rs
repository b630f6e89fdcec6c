use super::*;
pub(super) fn handle_config(args: ConfigArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(args, ctx),
        ConfigCommands::Show => handle_show(ctx),
    }
}

pub(super) fn handle_init(args: InitArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let audit = ctx.audit;
    let result: anyhow::Result<()> = (|| {
        let mut config = AppConfig::load(ctx.config_path)?;
        apply_init(&mut config, args)?;
        config.save(ctx.config_path)?;
        println!("Config saved to {}", ctx.config_path.display());
        Ok(())
    })();

    match &result {
        Ok(()) => {
            let audit_id = record_audit(
                audit,
                AuditRecord::new("config.init", AuditStatus::Ok).command("config.init"),
            );
            print_audit_id(audit_id.as_deref());
        }
        Err(err) => {
            record_audit(
                audit,
                AuditRecord::new("config.init", AuditStatus::Failed)
                    .command("config.init")
                    .error(format!("{err:#}")),
            );
        }
    }
    result
}

/// Writes the init flags into `config`; the repository list is left alone.
pub(super) fn apply_init(config: &mut AppConfig, args: InitArgs) -> anyhow::Result<()> {
    if args.max_threads == Some(0) {
        anyhow::bail!("max threads must be at least 1");
    }
    if args.timeout == Some(0) {
        anyhow::bail!("timeout must be at least 1 second");
    }
    config.repo_root = Some(args.repo_root);
    if args.max_threads.is_some() {
        config.max_threads = args.max_threads;
    }
    if args.timeout.is_some() {
        config.operation_timeout_secs = args.timeout;
    }
    if args.vcs_path.is_some() {
        config.vcs_path = args.vcs_path;
    }
    Ok(())
}

pub(super) fn handle_show(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let config = AppConfig::load(ctx.config_path)?;
    let settings = resolve_settings(SettingsOverrides::default(), &config)?;
    println!("Config: {}", ctx.config_path.display());
    println!("Repo root: {}", settings.repo_root.display());
    println!("Max threads: {}", settings.max_threads);
    println!("Timeout: {}s", settings.operation_timeout.as_secs());
    println!(
        "Git: {}",
        settings
            .vcs_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "auto".to_string())
    );
    println!("Repositories: {}", config.repositories.len());
    Ok(())
}
