//! Application configuration loaded from environment variables.

use crate::errors::{CoordinatorError, Result};
use crate::ledger::Network;

#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// Ledger network addresses are decoded for (`main` or `test`)
    pub network: Network,
    /// Largest pledge file accepted by the submit endpoint
    pub max_pledge_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./lighthouse.db".to_string()),
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| CoordinatorError::Config("Invalid API_PORT".to_string()))?,
            network: env_var("NETWORK")
                .unwrap_or_else(|_| "main".to_string())
                .parse()?,
            max_pledge_bytes: env_var("MAX_PLEDGE_BYTES")
                .unwrap_or_else(|_| "65536".to_string())
                .parse()
                .map_err(|_| CoordinatorError::Config("Invalid MAX_PLEDGE_BYTES".to_string()))?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| CoordinatorError::Config(format!("Missing env var: {key}")))
}
