//! Configuration validation.

use crate::error::{HistoryError, Result};

use super::types::StoreConfig;

const SSL_MODES: &[&str] = &["disable", "require", "verify-ca", "verify-full"];

pub fn validate(config: &StoreConfig) -> Result<()> {
    let db = &config.database;

    if db.host.trim().is_empty() {
        return Err(HistoryError::Config("database.host must not be empty".into()));
    }
    if db.database.trim().is_empty() {
        return Err(HistoryError::Config(
            "database.database must not be empty".into(),
        ));
    }
    if db.user.trim().is_empty() {
        return Err(HistoryError::Config("database.user must not be empty".into()));
    }
    if db.pool_size == 0 {
        return Err(HistoryError::Config(
            "database.pool_size must be at least 1".into(),
        ));
    }

    if !SSL_MODES.contains(&db.ssl_mode.to_lowercase().as_str()) {
        return Err(HistoryError::Config(format!(
            "Invalid ssl_mode '{}'. Valid options: disable, require, verify-ca, verify-full",
            db.ssl_mode
        )));
    }

    // The schema name is interpolated into DDL; restrict it to plain
    // identifier characters.
    let valid_schema = !db.schema.is_empty()
        && db
            .schema
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !db.schema.starts_with(|c: char| c.is_ascii_digit());
    if !valid_schema {
        return Err(HistoryError::Config(format!(
            "Invalid schema name '{}': use letters, digits and underscores only",
            db.schema
        )));
    }

    Ok(())
}
