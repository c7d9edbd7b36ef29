//! Cairn CLI entrypoint.

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod handlers;

use commands::{Commands, ConfigCommands};

#[derive(Parser)]
#[command(name = "cairn")]
#[command(author, version, about = "Cairn adaptive resource and cache engine", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $CAIRN_CONFIG, then ./cairn.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = config::load(cli.config.as_deref())?;
                handlers::show_config(&config)?;
            }
            ConfigCommands::Validate { path } => {
                handlers::validate_config(std::path::Path::new(&path))?
            }
        },
        Commands::Fetch {
            urls,
            priority,
            kind,
            no_cache,
            repeat,
        } => {
            let config = config::load(cli.config.as_deref())?;
            handlers::fetch(config, urls, priority.into(), kind.into(), !no_cache, repeat).await?;
        }
        Commands::Monitor { samples, fps } => {
            let config = config::load(cli.config.as_deref())?;
            handlers::monitor(config, samples, fps).await?;
        }
    }

    Ok(())
}
