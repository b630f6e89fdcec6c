use super::*;
pub(super) fn handle_repo(args: RepoArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    match args.command {
        RepoCommands::Add(args) => handle_add_repo(args, ctx),
        RepoCommands::Remove(args) => handle_remove_repo(args, ctx),
        RepoCommands::List => handle_list_repos(ctx),
    }
}

pub(super) fn handle_add_repo(args: AddRepoArgs, ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let audit = ctx.audit;
    let name = args.name.clone();
    let result: anyhow::Result<()> = (|| {
        let mut config = AppConfig::load(ctx.config_path)?;
        if config.repositories.iter().any(|repo| repo.name == args.name) {
            println!("Repository {} already exists.", args.name);
            let audit_id = record_audit(
                audit,
                AuditRecord::new("repo.add", AuditStatus::Skipped)
                    .command("repo.add")
                    .context(repo_context(&args.name))
                    .error("repository already exists"),
            );
            print_audit_id(audit_id.as_deref());
            return Ok(());
        }

        config.add_repository(RepoDescriptor::new(args.name.clone(), args.url.clone()))?;
        config.save(ctx.config_path)?;
        println!(
            "Repository {} added to {}",
            args.name,
            ctx.config_path.display()
        );
        let audit_id = record_audit(
            audit,
            AuditRecord::new("repo.add", AuditStatus::Ok)
                .command("repo.add")
                .context(repo_context(&args.name))
                .details(serde_json::json!({ "url": args.url })),
        );
        print_audit_id(audit_id.as_deref());
        Ok(())
    })();

    if let Err(err) = &result {
        record_audit(
            audit,
            AuditRecord::new("repo.add", AuditStatus::Failed)
                .command("repo.add")
                .context(repo_context(&name))
                .error(format!("{err:#}")),
        );
    }
    result
}

pub(super) fn handle_remove_repo(
    args: RemoveRepoArgs,
    ctx: &CommandContext<'_>,
) -> anyhow::Result<()> {
    let audit = ctx.audit;
    let result: anyhow::Result<()> = (|| {
        let mut config = AppConfig::load(ctx.config_path)?;
        if !config.remove_repository(&args.name) {
            println!("Repository {} not found.", args.name);
            let audit_id = record_audit(
                audit,
                AuditRecord::new("repo.remove", AuditStatus::Skipped)
                    .command("repo.remove")
                    .context(repo_context(&args.name))
                    .error("repository not found"),
            );
            print_audit_id(audit_id.as_deref());
            return Ok(());
        }
        config.save(ctx.config_path)?;
        println!("Repository {} removed. Its working copy was left on disk.", args.name);
        let audit_id = record_audit(
            audit,
            AuditRecord::new("repo.remove", AuditStatus::Ok)
                .command("repo.remove")
                .context(repo_context(&args.name)),
        );
        print_audit_id(audit_id.as_deref());
        Ok(())
    })();

    if let Err(err) = &result {
        record_audit(
            audit,
            AuditRecord::new("repo.remove", AuditStatus::Failed)
                .command("repo.remove")
                .context(repo_context(&args.name))
                .error(format!("{err:#}")),
        );
    }
    result
}

pub(super) fn handle_list_repos(ctx: &CommandContext<'_>) -> anyhow::Result<()> {
    let config = AppConfig::load(ctx.config_path)?;
    if config.repositories.is_empty() {
        println!("No repositories configured.");
        return Ok(());
    }
    for repo in &config.repositories {
        println!("{} | {}", repo.name, repo.url);
    }
    Ok(())
}

fn repo_context(name: &str) -> AuditContext {
    AuditContext {
        repo: Some(name.to_string()),
        ..AuditContext::default()
    }
}
