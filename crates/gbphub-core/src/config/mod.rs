//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod app;
pub mod client;
pub mod logging;
pub mod worker;

use serde::{Deserialize, Serialize};

use self::app::ServerConfig;
use self::client::ClientConfig;
use self::logging::LoggingConfig;
use self::worker::WorkerConfig;

use crate::error::AppError;

pub use self::worker::{RetryConfig, WorkloadConfig};

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Which persistence backend to use.
    #[serde(default)]
    pub store: StoreConfig,
    /// Batch engine settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// External API clients.
    #[serde(default)]
    pub clients: ClientConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL.
    #[serde(default)]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Idle connection timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

/// Persistence backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// PostgreSQL via sqlx.
    #[default]
    Postgres,
    /// Process-local maps; state is lost on restart.
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend to use.
    #[serde(default)]
    pub backend: StoreBackend,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `GBPHUB__`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("GBPHUB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.store.backend == StoreBackend::Postgres && self.database.url.is_empty() {
            return Err(AppError::configuration(
                "database.url is required when store.backend = \"postgres\"",
            ));
        }
        if self.worker.max_concurrent_tenants == 0 {
            return Err(AppError::configuration(
                "worker.max_concurrent_tenants must be at least 1",
            ));
        }
        for (name, workload) in [
            ("rank_check", &self.worker.rank_check),
            ("post_publish", &self.worker.post_publish),
        ] {
            if workload.retry.max_attempts == 0 {
                return Err(AppError::configuration(format!(
                    "worker.{name}.retry.max_attempts must be at least 1"
                )));
            }
            if workload.retry.multiplier < 1.0 {
                return Err(AppError::configuration(format!(
                    "worker.{name}.retry.multiplier must be >= 1.0"
                )));
            }
        }
        Ok(())
    }
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    300
}
