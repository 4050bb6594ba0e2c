//! Store schema DDL, migration, and currency checking.
//!
//! All tables live in one dedicated schema. `init_schema` is idempotent
//! (`IF NOT EXISTS` everywhere) and stamps [`SCHEMA_VERSION`]; the currency
//! check compares the stamp before any import and surfaces a distinguished
//! `MigrationRequired` error on mismatch, never migrating implicitly.

use tokio_postgres::Client;
use tracing::info;

use crate::error::{HistoryError, Result};

/// Schema version this build expects. Bump together with any DDL change.
pub(crate) const SCHEMA_VERSION: i32 = 1;

/// Record-type tables in import dependency order.
pub(crate) const RECORD_TABLES: &[&str] = &[
    "controller",
    "module",
    "data_type",
    "program",
    "routine",
    "tag",
    "rung",
];

/// Create the store schema and all tables, then stamp the schema version.
pub(crate) async fn init_schema(client: &Client, schema: &str) -> Result<()> {
    client
        .execute(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema), &[])
        .await?;

    client
        .execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}.schema_version (
                    version INTEGER NOT NULL
                )",
                schema
            ),
            &[],
        )
        .await?;

    client
        .execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}.target (
                    target_id BIGSERIAL PRIMARY KEY,
                    target_key TEXT NOT NULL UNIQUE
                )",
                schema
            ),
            &[],
        )
        .await?;

    client
        .execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {}.snapshot (
                    snapshot_id BIGSERIAL PRIMARY KEY,
                    target_id BIGINT NOT NULL REFERENCES {}.target(target_id) ON DELETE CASCADE,
                    target_type TEXT NOT NULL,
                    target_name TEXT NOT NULL,
                    is_partial BOOLEAN NOT NULL,
                    schema_revision TEXT NOT NULL,
                    software_revision TEXT NOT NULL,
                    exported_at TIMESTAMPTZ NOT NULL,
                    imported_at TIMESTAMPTZ NOT NULL,
                    imported_by TEXT NOT NULL,
                    imported_host TEXT NOT NULL,
                    source_hash BYTEA NOT NULL,
                    source_data BYTEA NOT NULL
                )",
                schema, schema
            ),
            &[],
        )
        .await?;

    // Latest-snapshot lookups order by import time, ties broken by id.
    client
        .execute(
            &format!(
                "CREATE INDEX IF NOT EXISTS idx_snapshot_target_imported
                    ON {}.snapshot(target_id, imported_at DESC, snapshot_id DESC)",
                schema
            ),
            &[],
        )
        .await?;

    for (table, columns, business_key) in record_table_defs() {
        client
            .execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {}.{} (
                    {}_id BIGSERIAL PRIMARY KEY,
                    snapshot_id BIGINT NOT NULL REFERENCES {}.snapshot(snapshot_id) ON DELETE CASCADE,
                    {},
                    record_hash BYTEA NOT NULL
                )",
                    schema, table, table, schema, columns
                ),
                &[],
            )
            .await?;

        // One row per business key within a snapshot.
        client
            .execute(
                &format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_{}_snapshot_key
                        ON {}.{}(snapshot_id, {})",
                    table, schema, table, business_key
                ),
                &[],
            )
            .await?;

        // Cross-snapshot diffing by content hash.
        client
            .execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS idx_{}_record_hash
                        ON {}.{}(record_hash, snapshot_id)",
                    table, schema, table
                ),
                &[],
            )
            .await?;
    }

    // Stamp the version; a single-row table keeps the check trivial.
    client
        .execute(&format!("DELETE FROM {}.schema_version", schema), &[])
        .await?;
    client
        .execute(
            &format!("INSERT INTO {}.schema_version (version) VALUES ($1)", schema),
            &[&SCHEMA_VERSION],
        )
        .await?;

    info!("store schema '{}' migrated to version {}", schema, SCHEMA_VERSION);
    Ok(())
}

/// (table, column DDL fragment, business key column list) per record kind.
fn record_table_defs() -> Vec<(&'static str, &'static str, &'static str)> {
    vec![
        (
            "controller",
            "name TEXT NOT NULL,
                    processor_type TEXT NOT NULL,
                    firmware_major INTEGER NOT NULL,
                    firmware_minor INTEGER NOT NULL,
                    comment TEXT",
            "name",
        ),
        (
            "module",
            "name TEXT NOT NULL,
                    catalog_number TEXT NOT NULL,
                    vendor_id INTEGER NOT NULL,
                    product_code INTEGER NOT NULL,
                    slot SMALLINT,
                    comment TEXT",
            "name",
        ),
        (
            "data_type",
            "name TEXT NOT NULL,
                    family TEXT NOT NULL,
                    size_bytes INTEGER NOT NULL,
                    comment TEXT",
            "name",
        ),
        (
            "program",
            "name TEXT NOT NULL,
                    main_routine TEXT,
                    disabled BOOLEAN NOT NULL,
                    comment TEXT",
            "name",
        ),
        (
            "routine",
            "program_name TEXT NOT NULL,
                    name TEXT NOT NULL,
                    routine_type TEXT NOT NULL,
                    comment TEXT",
            "program_name, name",
        ),
        (
            "tag",
            "scope TEXT NOT NULL,
                    name TEXT NOT NULL,
                    data_type TEXT NOT NULL,
                    dimensions TEXT,
                    radix TEXT,
                    constant BOOLEAN NOT NULL,
                    comment TEXT",
            "scope, name",
        ),
        (
            "rung",
            "program_name TEXT NOT NULL,
                    routine_name TEXT NOT NULL,
                    number INTEGER NOT NULL,
                    rung_type TEXT NOT NULL,
                    text TEXT NOT NULL,
                    comment TEXT",
            "program_name, routine_name, number",
        ),
    ]
}

/// Read the stamped schema version; `None` when the store was never migrated.
pub(crate) async fn current_version(client: &Client, schema: &str) -> Result<Option<i32>> {
    let exists = client
        .query_one(
            "SELECT to_regclass($1) IS NOT NULL",
            &[&format!("{}.schema_version", schema)],
        )
        .await?;
    if !exists.get::<_, bool>(0) {
        return Ok(None);
    }

    let row = client
        .query_opt(
            &format!("SELECT version FROM {}.schema_version LIMIT 1", schema),
            &[],
        )
        .await?;
    Ok(row.map(|r| r.get(0)))
}

/// Fail with `MigrationRequired` unless the stamp matches this build.
pub(crate) async fn ensure_current(client: &Client, schema: &str) -> Result<()> {
    let current = current_version(client, schema).await?.unwrap_or(0);
    if current != SCHEMA_VERSION {
        return Err(HistoryError::MigrationRequired {
            current,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Delete every stored row while keeping the schema in place.
///
/// Targets cascade to snapshots, snapshots cascade to record rows.
pub(crate) async fn purge(client: &Client, schema: &str) -> Result<()> {
    client
        .execute(&format!("DELETE FROM {}.target", schema), &[])
        .await?;
    info!("store schema '{}' purged", schema);
    Ok(())
}

/// Drop the whole store schema.
pub(crate) async fn drop_storage(client: &Client, schema: &str) -> Result<()> {
    client
        .execute(&format!("DROP SCHEMA IF EXISTS {} CASCADE", schema), &[])
        .await?;
    info!("store schema '{}' dropped", schema);
    Ok(())
}
