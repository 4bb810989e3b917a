#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use beacon_service::Config;
use beacon_service::database::{self, Database};
use clap::Parser;

mod error;
mod routes;

use error::AppError;
use logger::init_tracing;

/// Read-only HTTP view over check history
#[derive(Debug, Parser)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/beacon/config.toml)
    #[arg(short, long, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_config(cli.config.as_deref())?;

    let db: Arc<dyn Database> =
        Arc::new(database::open(&config.database.path, config.database.max_connections).await?);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    run_server(addr, db).await
}

async fn run_server(addr: SocketAddr, db: Arc<dyn Database>) -> Result<(), AppError> {
    let data = web::Data::from(db);
    tracing::info!(%addr, "Starting HTTP server");

    HttpServer::new(move || App::new().app_data(data.clone()).configure(routes::routes))
        .bind(addr)?
        .run()
        .await?;

    Ok(())
}
