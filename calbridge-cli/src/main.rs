mod commands;
mod render;
mod tui;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use calbridge_core::Config;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "calbridge")]
#[command(about = "Keep a cloud calendar in step with your source calendar")]
struct Cli {
    /// Config file (default: ~/.config/calbridge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
    /// Run a single sync cycle
    Sync,
    /// Sync on a schedule until interrupted
    Daemon,
    /// Show what the last sync left in the snapshot
    Status,
    /// List events currently on the sink calendar
    Remote,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::default_path()?,
    };

    match cli.command {
        Commands::Init { force } => commands::init::run(&config_path, force),
        Commands::Sync => commands::sync::run(&load_config(&config_path)?).await,
        Commands::Daemon => commands::daemon::run(&load_config(&config_path)?).await,
        Commands::Status => commands::status::run(&load_config(&config_path)?),
        Commands::Remote => commands::remote::run(&load_config(&config_path)?).await,
    }
}

fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!(
            "No config found at {}.\n\n\
            Create one with:\n  \
            calbridge init",
            path.display()
        );
    }

    Config::load(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "calbridge=debug,calbridge_core=debug"
    } else {
        "calbridge=info,calbridge_core=info"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
