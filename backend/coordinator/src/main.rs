//! Lighthouse pledge coordinator entry point.
//!
//! Stores projects and pledges in SQLite, checks every submitted pledge
//! against the project's assurance contract and builds the claim transaction
//! once the goal is met. Exposes everything through a small Axum REST API.

mod api;
mod config;
mod coordinator;
mod db;
mod errors;
mod ledger;


use std::path::Path;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use ledger::BsvLedger;

/// Load the optional env file (`.env` unless `env_file` is given), then build
/// the log filter so the file can set `RUST_LOG`.
fn log_filter(env_file: Option<&Path>) -> EnvFilter {
    // A missing file is fine.
    let _ = match env_file {
        Some(path) => dotenvy::from_path(path),
        None => dotenvy::dotenv().map(|_| ()),
    };
    EnvFilter::from_default_env()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(None))
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;
    info!("Coordinator starting on {} network", config.network);

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let api_state = Arc::new(api::ApiState {
        pool,
        ledger: BsvLedger::new(config.network),
        max_pledge_bytes: config.max_pledge_bytes,
        locks: Default::default(),
    });
    let app = api::router(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
