//! The snapshot store facade.
//!
//! [`SnapshotStore`] owns the connection pool and the registered import
//! processors. `add_snapshot` is the hard path: schema currency check, one
//! session (one connection, one transaction), action policy, target and
//! snapshot inserts, every processor in fixed dependency order, then commit;
//! any failure rolls the whole transaction back and rethrows the original
//! error. Everything else is simple parameterized reads and deletes outside
//! that transaction.

pub mod actions;
pub mod pool;
pub mod queries;
pub mod schema;
pub mod session;

use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::{HistoryError, Result};
use crate::import::processors::{make_strategy, standard_processors};
use crate::import::ImportProcessor;
use crate::snapshot::{Snapshot, TargetKey};

pub use actions::SnapshotAction;
pub use queries::SnapshotInfo;
pub use session::{ImportSession, PgConnection};

/// Facade over the relational snapshot store.
pub struct SnapshotStore {
    pool: Pool,
    schema: String,
    processors: Vec<Box<dyn ImportProcessor>>,
}

impl SnapshotStore {
    /// Connect to the store and register the standard processor set.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let pool = pool::build_pool(&config.database).await?;
        let strategy = make_strategy(config.import.write_strategy);
        Ok(Self {
            pool,
            schema: config.database.schema.clone(),
            processors: standard_processors(strategy),
        })
    }

    /// Replace the processor registry.
    ///
    /// Processors run in the order given; the order must respect record
    /// dependencies.
    pub fn with_processors(mut self, processors: Vec<Box<dyn ImportProcessor>>) -> Self {
        self.processors = processors;
        self
    }

    /// Store schema name.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Create or update the store schema to the version this build expects.
    pub async fn migrate(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        schema::init_schema(&client, &self.schema).await
    }

    /// Import one snapshot atomically across all record tables.
    ///
    /// On success the snapshot carries its assigned identity and the new
    /// snapshot id is returned. On any failure the transaction is rolled
    /// back in full and the original error is rethrown.
    pub async fn add_snapshot(
        &self,
        snapshot: &mut Snapshot,
        action: SnapshotAction,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }

        // Schema currency is checked before the import transaction opens.
        {
            let client = self.client().await?;
            schema::ensure_current(&client, &self.schema).await?;
        }

        let session = ImportSession::open_postgres(&self.pool, &self.schema).await?;
        match self.run_import(&session, snapshot, action, cancel).await {
            Ok(snapshot_id) => {
                session.commit().await?;
                info!(
                    "imported snapshot {} for {} ({:?})",
                    snapshot_id,
                    snapshot.target_key(),
                    action
                );
                Ok(snapshot_id)
            }
            Err(err) => {
                if let Err(rb) = session.rollback().await {
                    warn!("rollback failed after import error: {}", rb);
                }
                Err(err)
            }
        }
    }

    /// The transactional body of `add_snapshot`.
    async fn run_import(
        &self,
        session: &ImportSession,
        snapshot: &mut Snapshot,
        action: SnapshotAction,
        cancel: &CancellationToken,
    ) -> Result<i64> {
        action.apply(session, snapshot.target_key()).await?;

        let client = session.postgres()?;
        let schema = session.schema();

        // Targets are created lazily on first snapshot.
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {schema}.target (target_key) VALUES ($1)
                     ON CONFLICT (target_key) DO UPDATE SET target_key = EXCLUDED.target_key
                     RETURNING target_id"
                ),
                &[&snapshot.target_key().as_str()],
            )
            .await?;
        let target_id: i64 = row.get(0);

        let imported_at = Utc::now();
        let source_hash = snapshot.source_hash();
        let source_data = snapshot.source_data();
        let row = client
            .query_one(
                &format!(
                    "INSERT INTO {schema}.snapshot (
                        target_id, target_type, target_name, is_partial,
                        schema_revision, software_revision, exported_at,
                        imported_at, imported_by, imported_host,
                        source_hash, source_data
                     ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                     RETURNING snapshot_id"
                ),
                &[
                    &target_id,
                    &snapshot.target_type(),
                    &snapshot.target_name(),
                    &snapshot.is_partial(),
                    &snapshot.schema_revision(),
                    &snapshot.software_revision(),
                    &snapshot.exported_at(),
                    &imported_at,
                    &snapshot.imported_by(),
                    &snapshot.imported_host(),
                    &source_hash,
                    &source_data,
                ],
            )
            .await?;
        let snapshot_id: i64 = row.get(0);
        snapshot.assign_identity(snapshot_id, imported_at);

        for processor in &self.processors {
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }
            processor.process(snapshot, session, cancel).await?;
        }

        Ok(snapshot_id)
    }

    // ===== Retrieval =====

    /// List snapshot metadata, optionally filtered to one target key,
    /// newest first.
    pub async fn list_snapshots(
        &self,
        filter: Option<&TargetKey>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SnapshotInfo>> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let base = format!(
            "SELECT {} FROM {}.snapshot s JOIN {}.target t ON t.target_id = s.target_id",
            queries::INFO_COLUMNS,
            self.schema,
            self.schema
        );
        let order = " ORDER BY s.imported_at DESC, s.snapshot_id DESC";

        let rows = match filter {
            Some(key) => {
                client
                    .query(
                        &format!("{} WHERE t.target_key = $1{}", base, order),
                        &[&key.as_str()],
                    )
                    .await?
            }
            None => client.query(&format!("{}{}", base, order), &[]).await?,
        };
        Ok(rows.iter().map(queries::info_from_row).collect())
    }

    /// Fetch the most recently imported snapshot for a target key.
    pub async fn get_snapshot_latest(
        &self,
        key: &TargetKey,
        cancel: &CancellationToken,
    ) -> Result<Option<Snapshot>> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!(
                    "{} WHERE t.target_key = $1
                     ORDER BY s.imported_at DESC, s.snapshot_id DESC LIMIT 1",
                    self.select_snapshot()
                ),
                &[&key.as_str()],
            )
            .await?;
        row.map(|r| queries::snapshot_from_row(&r)).transpose()
    }

    /// Fetch one snapshot by id.
    pub async fn get_snapshot_by_id(
        &self,
        snapshot_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Snapshot>> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let row = client
            .query_opt(
                &format!("{} WHERE s.snapshot_id = $1", self.select_snapshot()),
                &[&snapshot_id],
            )
            .await?;
        row.map(|r| queries::snapshot_from_row(&r)).transpose()
    }

    // ===== Deletion =====

    /// Delete one snapshot by id. Returns whether a row was removed.
    pub async fn delete_snapshot_by_id(
        &self,
        snapshot_id: i64,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let deleted = client
            .execute(
                &format!("DELETE FROM {}.snapshot WHERE snapshot_id = $1", self.schema),
                &[&snapshot_id],
            )
            .await?;
        Ok(deleted > 0)
    }

    /// Delete the most recently imported snapshot for a target key.
    pub async fn delete_snapshot_latest(
        &self,
        key: &TargetKey,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let deleted = client
            .execute(
                &format!(
                    "DELETE FROM {schema}.snapshot WHERE snapshot_id = (
                        SELECT s.snapshot_id
                        FROM {schema}.snapshot s
                        JOIN {schema}.target t ON t.target_id = s.target_id
                        WHERE t.target_key = $1
                        ORDER BY s.imported_at DESC, s.snapshot_id DESC
                        LIMIT 1
                    )",
                    schema = self.schema
                ),
                &[&key.as_str()],
            )
            .await?;
        Ok(deleted > 0)
    }

    /// Purge every snapshot for a target key, removing the target itself.
    ///
    /// Returns the number of snapshots removed.
    pub async fn delete_snapshots_for_target(
        &self,
        key: &TargetKey,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let count: i64 = client
            .query_one(
                &format!(
                    "SELECT COUNT(*) FROM {schema}.snapshot s
                     JOIN {schema}.target t ON t.target_id = s.target_id
                     WHERE t.target_key = $1",
                    schema = self.schema
                ),
                &[&key.as_str()],
            )
            .await?
            .get(0);
        client
            .execute(
                &format!("DELETE FROM {}.target WHERE target_key = $1", self.schema),
                &[&key.as_str()],
            )
            .await?;
        Ok(count as u64)
    }

    /// Delete a target's snapshots imported strictly before `cutoff`.
    pub async fn delete_snapshots_before(
        &self,
        key: &TargetKey,
        cutoff: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        let deleted = client
            .execute(
                &format!(
                    "DELETE FROM {schema}.snapshot s
                     USING {schema}.target t
                     WHERE t.target_id = s.target_id
                       AND t.target_key = $1
                       AND s.imported_at < $2",
                    schema = self.schema
                ),
                &[&key.as_str(), &cutoff],
            )
            .await?;
        Ok(deleted)
    }

    /// Delete every stored row, keeping the schema.
    pub async fn purge(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        schema::purge(&client, &self.schema).await
    }

    /// Drop the store schema entirely.
    pub async fn drop_storage(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }
        let client = self.client().await?;
        schema::drop_storage(&client, &self.schema).await
    }

    fn select_snapshot(&self) -> String {
        format!(
            "SELECT s.snapshot_id, t.target_key, s.target_type, s.target_name, s.is_partial,
                    s.schema_revision, s.software_revision, s.exported_at, s.imported_at,
                    s.imported_by, s.imported_host, s.source_hash, s.source_data
             FROM {schema}.snapshot s
             JOIN {schema}.target t ON t.target_id = s.target_id",
            schema = self.schema
        )
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| HistoryError::pool(e, "getting store connection"))
    }
}
