use super::*;
#[derive(Parser)]
#[command(name = "reposync", author, version, about)]
pub(super) struct Cli {
    #[arg(short, long, global = true, help = "Verbose logging and failure details")]
    pub(super) verbose: bool,
    #[arg(long, global = true, help = "Config file (defaults to the user config dir)")]
    pub(super) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Clone and/or update every configured repository")]
    Sync(SyncArgs),
    #[command(about = "Show the local state of every configured repository")]
    Status(StatusArgs),
    #[command(about = "Manage config")]
    Config(ConfigArgs),
    #[command(about = "Manage the repository list")]
    Repo(RepoArgs),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(super) enum OperationValue {
    CloneOnly,
    UpdateOnly,
    CloneAndUpdate,
}

impl From<OperationValue> for OperationMode {
    fn from(value: OperationValue) -> Self {
        match value {
            OperationValue::CloneOnly => OperationMode::CloneOnly,
            OperationValue::UpdateOnly => OperationMode::UpdateOnly,
            OperationValue::CloneAndUpdate => OperationMode::CloneAndUpdate,
        }
    }
}

#[derive(Parser)]
pub(super) struct SyncArgs {
    #[arg(long, value_enum, default_value = "clone-and-update")]
    pub(super) operation: OperationValue,
    #[arg(long, help = "Maximum concurrent repository operations")]
    pub(super) max_threads: Option<usize>,
    #[arg(long, help = "Directory that holds one working copy per repository")]
    pub(super) repo_root: Option<PathBuf>,
    #[arg(long, help = "Path to the git executable")]
    pub(super) vcs_path: Option<PathBuf>,
    #[arg(long, help = "Timeout in seconds for clone, fetch and submodule steps")]
    pub(super) timeout: Option<u64>,
    #[arg(long, help = "Only sync the named repository (repeatable)")]
    pub(super) only: Vec<String>,
    #[arg(long, help = "Print the final report as JSON")]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct StatusArgs {
    #[arg(long)]
    pub(super) repo_root: Option<PathBuf>,
    #[arg(long)]
    pub(super) vcs_path: Option<PathBuf>,
    #[arg(long, help = "Print statuses as JSON")]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Initialize config with a repository root")]
    Init(InitArgs),
    #[command(about = "Print the effective config")]
    Show,
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long)]
    pub(super) repo_root: PathBuf,
    #[arg(long)]
    pub(super) max_threads: Option<usize>,
    #[arg(long)]
    pub(super) timeout: Option<u64>,
    #[arg(long)]
    pub(super) vcs_path: Option<PathBuf>,
}

#[derive(Parser)]
pub(super) struct RepoArgs {
    #[command(subcommand)]
    pub(super) command: RepoCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum RepoCommands {
    #[command(about = "Add a repository to the config")]
    Add(AddRepoArgs),
    #[command(about = "Remove a repository by name")]
    Remove(RemoveRepoArgs),
    #[command(about = "List configured repositories")]
    List,
}

#[derive(Parser)]
pub(super) struct AddRepoArgs {
    #[arg(long)]
    pub(super) name: String,
    #[arg(long)]
    pub(super) url: String,
}

#[derive(Parser)]
pub(super) struct RemoveRepoArgs {
    #[arg(long)]
    pub(super) name: String,
}
