//! Process configuration read from the environment (and `.env`, if present).

use std::env;
use std::time::Duration;

use crate::error::{MarketplaceError, Result};
use crate::store::StorageConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_CHAT_POLL_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub simulated_latency: Duration,
    pub chat_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            simulated_latency: Duration::ZERO,
            chat_poll_interval: Duration::from_millis(DEFAULT_CHAT_POLL_MS),
        }
    }
}

impl Config {
    /// `TELOXIDE_TOKEN` is read by the bot itself, not here.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let max_connections = match var("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => parse_number::<u32>("DATABASE_MAX_CONNECTIONS", &raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if max_connections == 0 {
            return Err(MarketplaceError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".to_string(),
            ));
        }

        let simulated_latency = match var("SIMULATED_LATENCY_MS") {
            Some(raw) => Duration::from_millis(parse_number("SIMULATED_LATENCY_MS", &raw)?),
            None => Duration::ZERO,
        };
        let chat_poll_interval = match var("CHAT_POLL_INTERVAL_MS") {
            Some(raw) => match parse_number::<u64>("CHAT_POLL_INTERVAL_MS", &raw)? {
                0 => {
                    return Err(MarketplaceError::Config(
                        "CHAT_POLL_INTERVAL_MS must be positive".to_string(),
                    ))
                }
                ms => Duration::from_millis(ms),
            },
            None => Duration::from_millis(DEFAULT_CHAT_POLL_MS),
        };

        Ok(Self {
            database_url: var("DATABASE_URL"),
            max_connections,
            simulated_latency,
            chat_poll_interval,
        })
    }

    pub fn storage(&self) -> StorageConfig {
        match &self.database_url {
            Some(url) => StorageConfig::Postgres {
                database_url: url.clone(),
                max_connections: self.max_connections,
            },
            None => StorageConfig::Memory,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| MarketplaceError::Config(format!("{key} must be a whole number, got '{raw}'")))
}
