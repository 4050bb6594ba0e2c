//! Snapshot action policy: what to delete before inserting a new snapshot.
//!
//! Deletions run on the import session's transaction, in the SAME
//! transaction as the subsequent insert. A failure anywhere before commit
//! rolls the deletions back with everything else, so no failure window
//! exists in which a target is deleted but not replaced. (The alternative,
//! committing the delete separately, would lose history on a crash between
//! the two commits.)

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::snapshot::TargetKey;
use crate::store::session::ImportSession;

/// Pre-deletion policy applied before a new snapshot insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotAction {
    /// Keep all prior snapshots.
    Append,
    /// Delete the most recently imported snapshot for the target key
    /// (import time descending, ties broken by highest snapshot id).
    ReplaceLatest,
    /// Delete every snapshot for the target key; record rows go with them
    /// via cascade.
    ReplaceAll,
}

impl SnapshotAction {
    /// Apply the policy for `key` on the open session.
    pub(crate) async fn apply(&self, session: &ImportSession, key: &TargetKey) -> Result<u64> {
        let client = session.postgres()?;
        let schema = session.schema();

        let deleted = match self {
            SnapshotAction::Append => 0,
            SnapshotAction::ReplaceLatest => {
                client
                    .execute(
                        &format!(
                            "DELETE FROM {schema}.snapshot WHERE snapshot_id = (
                                SELECT s.snapshot_id
                                FROM {schema}.snapshot s
                                JOIN {schema}.target t ON t.target_id = s.target_id
                                WHERE t.target_key = $1
                                ORDER BY s.imported_at DESC, s.snapshot_id DESC
                                LIMIT 1
                            )"
                        ),
                        &[&key.as_str()],
                    )
                    .await?
            }
            SnapshotAction::ReplaceAll => {
                client
                    .execute(
                        &format!(
                            "DELETE FROM {schema}.snapshot s
                             USING {schema}.target t
                             WHERE t.target_id = s.target_id AND t.target_key = $1"
                        ),
                        &[&key.as_str()],
                    )
                    .await?
            }
        };

        if deleted > 0 {
            debug!(
                "action {:?} removed {} prior snapshot(s) for {}",
                self, deleted, key
            );
        }
        Ok(deleted)
    }
}
