use std::path::PathBuf;

use anyhow::Result;
use beacon_service::{Config, Orchestrator};
use clap::{Parser, Subcommand};
use logger::init_tracing;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(version, about = "Periodic URL health checks with transition alerts")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long, env = "BEACON_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler loop until Ctrl-C
    Run,
    /// Run a single tick and print its summary
    Tick,
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Tick => {
            let orchestrator = Orchestrator::new(&config).await?;
            let summary = orchestrator.tick_once().await?;
            println!("{summary}");
            Ok(())
        }
        Command::Config => {
            print!("{config}");
            Ok(())
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, finishing current tick...");
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl-C");
                // dropping the sender would stop the loop
                std::future::pending::<()>().await;
            }
        }
    });

    Orchestrator::start(config, shutdown_rx).await
}
