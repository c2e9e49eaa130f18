//! commandcenter: idea crystallization from the command line
//!
//! Records live in a JSON snapshot that is loaded before and saved after
//! every command.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, info};

use ideaspace::MemoryRepository;
use strategist::cli::{execute_command, Commands};
use strategist::{StrategistConfig, Workspace};

#[derive(Parser)]
#[command(name = "commandcenter")]
#[command(about = "Move ideas from resonance to validated, actionable tasks")]
struct Cli {
    /// Path to configuration file (TOML or YAML)
    #[arg(short, long, env = "COMMANDCENTER_CONFIG", default_value = "commandcenter.toml")]
    config: PathBuf,

    /// Snapshot file holding projects and ideas (overrides config file)
    #[arg(short, long, env = "COMMANDCENTER_STORE")]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = StrategistConfig::load(&cli.config)?;
    if let Some(store) = cli.store {
        config.store.snapshot_path = store;
    }

    // RUST_LOG wins over the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.general.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(config = %cli.config.display(), "Configuration loaded");
    info!(store = %config.store.snapshot_path.display(), "Loading records");

    let repo = MemoryRepository::load_snapshot(&config.store.snapshot_path).await?;
    let workspace = Workspace::from_config(&config, Arc::new(repo.clone()))?;

    let output = execute_command(&workspace, cli.command).await?;

    repo.save_snapshot(&config.store.snapshot_path).await?;
    println!("{}", output);
    Ok(())
}
