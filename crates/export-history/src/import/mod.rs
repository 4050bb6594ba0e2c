//! Import processors: one per record kind, driven by the facade in fixed
//! dependency order within a single transaction.

pub mod processors;
pub mod strategy;

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::mapping::TableMapping;
use crate::error::{HistoryError, Result};
use crate::snapshot::Snapshot;
use crate::source::ProjectExport;
use crate::store::session::ImportSession;

pub use processors::standard_processors;
pub use strategy::{BulkCopy, StreamedInsert, WriteStrategy};

/// One import step scoped to a snapshot id.
///
/// Processors never open their own transactions; all writes go through the
/// session they are handed.
#[async_trait]
pub trait ImportProcessor: Send + Sync {
    /// The record kind this processor persists (also its destination table).
    fn record_kind(&self) -> &'static str;

    /// Materialize and write this kind's rows for one snapshot.
    async fn process(
        &self,
        snapshot: &Snapshot,
        session: &ImportSession,
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// Generic processor binding a table mapping to a record query.
pub struct MappedProcessor<R: Send + Sync + 'static> {
    kind: &'static str,
    mapping: TableMapping<R>,
    query: fn(&ProjectExport) -> Vec<R>,
    strategy: Arc<dyn WriteStrategy>,
}

impl<R: Send + Sync + 'static> MappedProcessor<R> {
    pub fn new(
        kind: &'static str,
        mapping: TableMapping<R>,
        query: fn(&ProjectExport) -> Vec<R>,
        strategy: Arc<dyn WriteStrategy>,
    ) -> Self {
        Self {
            kind,
            mapping,
            query,
            strategy,
        }
    }
}

#[async_trait]
impl<R: Send + Sync + 'static> ImportProcessor for MappedProcessor<R> {
    fn record_kind(&self) -> &'static str {
        self.kind
    }

    async fn process(
        &self,
        snapshot: &Snapshot,
        session: &ImportSession,
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let snapshot_id = snapshot.snapshot_id().ok_or_else(|| {
            HistoryError::Validation("snapshot has no assigned identity".into())
        })?;

        let export = snapshot.get_source()?;
        let records = (self.query)(&export);
        if records.is_empty() {
            debug!("no {} records in snapshot {}", self.kind, snapshot_id);
            return Ok(0);
        }

        let rows = self.mapping.materialize(&records, snapshot_id)?;
        let plan = self.mapping.plan(session.schema());
        let written = self
            .strategy
            .write_rows(session, &plan, &rows, cancel)
            .await?;

        debug!(
            "processor {} wrote {} rows via {} strategy",
            self.kind,
            written,
            self.strategy.name()
        );
        Ok(written)
    }
}
