//! Configuration type definitions.

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store database configuration (PostgreSQL).
    pub database: DatabaseConfig,

    /// Import behavior configuration.
    #[serde(default)]
    pub import: ImportConfig,
}

/// Store database (PostgreSQL) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    pub password: String,

    /// Schema holding the snapshot tables (default: "export_history").
    #[serde(default = "default_schema")]
    pub schema: String,

    /// SSL mode (default: "require").
    #[serde(default = "default_require")]
    pub ssl_mode: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

/// Import behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImportConfig {
    /// Which write strategy processors use (default: bulk).
    #[serde(default)]
    pub write_strategy: WriteStrategyKind,
}

/// Backend write strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStrategyKind {
    /// Stage all rows into one COPY BINARY buffer, one round trip.
    #[default]
    Bulk,
    /// Prepare the insert once, bind and execute per record.
    Streamed,
}

fn default_pg_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "export_history".to_string()
}

fn default_require() -> String {
    "require".to_string()
}

fn default_pool_size() -> usize {
    4
}
