//! Configuration management for the Courier Logistics Service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with CLS__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Lifecycle batch tuning
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

/// Where documents are kept
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,

    /// PostgreSQL connection URL
    #[serde(default)]
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Concurrent per-consignment updates within one batch
    pub max_parallel_updates: usize,

    /// Reload-and-reapply attempts after a version conflict
    pub conflict_retries: u32,

    /// Month (1-12) the fiscal year starts in
    pub fiscal_year_start_month: u32,

    /// Seconds before an unfinished manifest delivery or cancellation may be resumed
    pub claim_ttl_secs: u64,
}

impl LifecycleConfig {
    pub fn claim_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.claim_ttl_secs.min(u32::MAX as u64) as i64)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("CLS_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.backend", "postgres")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("lifecycle.max_parallel_updates", 8)?
            .set_default("lifecycle.conflict_retries", 3)?
            .set_default("lifecycle.fiscal_year_start_month", shared::DEFAULT_FISCAL_START_MONTH as i64)?
            .set_default("lifecycle.claim_ttl_secs", 300)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (CLS prefix)
            .add_source(
                Environment::with_prefix("CLS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.backend == StorageBackend::Postgres && self.database.url.is_empty() {
            return Err(ConfigError::Message(
                "database.url is required for the postgres backend".to_string(),
            ));
        }
        if !(1..=12).contains(&self.lifecycle.fiscal_year_start_month) {
            return Err(ConfigError::Message(
                "lifecycle.fiscal_year_start_month must be between 1 and 12".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            max_parallel_updates: 8,
            conflict_retries: 3,
            fiscal_year_start_month: shared::DEFAULT_FISCAL_START_MONTH,
            claim_ttl_secs: 300,
        }
    }
}

impl Config {
    /// In-memory configuration for tests and local tooling
    pub fn in_memory() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: String::new(),
                max_connections: 1,
                min_connections: 0,
            },
            lifecycle: LifecycleConfig::default(),
        }
    }
}
