use super::*;
pub(super) fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log_buffer = logging::init(cli.verbose);

    let audit = open_audit_log();
    record_audit(&audit, AuditRecord::new("app.start", AuditStatus::Ok));
    info!(command = command_label(&cli.command), "Running command");

    let config_path = resolve_config_path(cli.config.as_deref())?;
    let ctx = CommandContext {
        audit: &audit,
        config_path: &config_path,
        verbose: cli.verbose,
        log_buffer: &log_buffer,
    };

    let result = match cli.command {
        Commands::Sync(args) => handle_sync(args, &ctx),
        Commands::Status(args) => handle_status(args, &ctx),
        Commands::Config(args) => handle_config(args, &ctx),
        Commands::Repo(args) => handle_repo(args, &ctx),
    };

    if let Err(err) = &result {
        record_audit(
            &audit,
            AuditRecord::new("app.error", AuditStatus::Failed).error(format!("{err:#}")),
        );
    }

    result
}

fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Sync(_) => "sync",
        Commands::Status(_) => "status",
        Commands::Config(_) => "config",
        Commands::Repo(_) => "repo",
    }
}
