//! Snapshot listing and retrieval row mapping.

use chrono::{DateTime, Utc};
use tokio_postgres::Row;

use crate::error::Result;
use crate::snapshot::{Snapshot, TargetKey};

/// Snapshot metadata without the stored source payload.
#[derive(Debug, Clone)]
pub struct SnapshotInfo {
    pub snapshot_id: i64,
    pub target_key: String,
    pub target_type: String,
    pub target_name: String,
    pub is_partial: bool,
    pub schema_revision: String,
    pub software_revision: String,
    pub exported_at: DateTime<Utc>,
    pub imported_at: DateTime<Utc>,
    pub imported_by: String,
    pub imported_host: String,
    pub source_hash: Vec<u8>,
}

/// Columns selected for [`SnapshotInfo`].
pub(crate) const INFO_COLUMNS: &str = "s.snapshot_id, t.target_key, s.target_type, \
     s.target_name, s.is_partial, s.schema_revision, s.software_revision, s.exported_at, \
     s.imported_at, s.imported_by, s.imported_host, s.source_hash";

pub(crate) fn info_from_row(row: &Row) -> SnapshotInfo {
    SnapshotInfo {
        snapshot_id: row.get(0),
        target_key: row.get(1),
        target_type: row.get(2),
        target_name: row.get(3),
        is_partial: row.get(4),
        schema_revision: row.get(5),
        software_revision: row.get(6),
        exported_at: row.get(7),
        imported_at: row.get(8),
        imported_by: row.get(9),
        imported_host: row.get(10),
        source_hash: row.get(11),
    }
}

pub(crate) fn snapshot_from_row(row: &Row) -> Result<Snapshot> {
    let key: String = row.get(1);
    Ok(Snapshot::from_stored(
        row.get(0),
        TargetKey::parse(&key)?,
        row.get(2),
        row.get(3),
        row.get(4),
        row.get(5),
        row.get(6),
        row.get(7),
        row.get(8),
        row.get(9),
        row.get(10),
        row.get(11),
        row.get(12),
    ))
}
