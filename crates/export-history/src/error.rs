//! Error types for the export history library.

use thiserror::Error;

/// Main error type for snapshot import and retrieval operations.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid snapshot input (missing target type/name, malformed key).
    ///
    /// Surfaced immediately, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The store schema is behind the version this build expects.
    ///
    /// Never auto-resolved; callers must run `migrate` explicitly.
    #[error("Migration required: store schema is at version {current}, expected {expected}")]
    MigrationRequired { current: i32, expected: i32 },

    /// Database connection or statement error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A session capability was requested that the open backend cannot provide.
    #[error("Session capability error: requested {requested}, but the session backend is {backend}")]
    Capability {
        requested: &'static str,
        backend: &'static str,
    },

    /// Mapping misconfiguration (storage-type mismatch, duplicate column).
    ///
    /// Treated as a programmer error: the import aborts before any write.
    #[error("Mapping error in table {table}: {message}")]
    Mapping { table: String, message: String },

    /// Canonical source data could not be decompressed or decoded.
    #[error("Source data error: {0}")]
    Source(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Import was cancelled (SIGINT, etc.)
    #[error("Import cancelled")]
    Cancelled,
}

impl HistoryError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        HistoryError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Mapping error for a destination table
    pub fn mapping(table: impl Into<String>, message: impl Into<String>) -> Self {
        HistoryError::Mapping {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for export history operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
