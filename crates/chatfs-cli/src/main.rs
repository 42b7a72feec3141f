mod cmd;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatfs", about = "Sandboxed chat-style file manager")]
struct Cli {
    /// Output as JSON instead of human-readable text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Filesystem operations
    #[command(subcommand)]
    Fs(cmd::fs::FsCommands),
    /// Snapshot timestamp queries
    #[command(subcommand)]
    Times(cmd::times::TimesCommands),
    /// Image conversion with interactive overwrite confirmation
    Convert(cmd::convert::ConvertArgs),
    /// Tag-based grouping index
    #[command(subcommand)]
    Group(cmd::group::GroupCommands),
    /// Take and persist a fresh metadata snapshot
    Snapshot(cmd::snapshot::SnapshotArgs),
    /// Run a custom command-file listing against a secondary mount
    CustomLs(cmd::custom::CustomLsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let json = cli.json;

    match cli.command {
        Commands::Fs(sub) => cmd::fs::run(sub, json).await,
        Commands::Times(sub) => cmd::times::run(sub, json),
        Commands::Convert(args) => cmd::convert::run(args, json).await,
        Commands::Group(sub) => cmd::group::run(sub, json).await,
        Commands::Snapshot(args) => cmd::snapshot::run(args, json).await,
        Commands::CustomLs(args) => cmd::custom::run(args).await,
    }
}
