//! Transactional import session.
//!
//! One session owns one pooled connection with one open transaction for the
//! whole of `add_snapshot`. Processors reach the live connection through a
//! capability lookup typed on the backend's connection type; requesting a
//! type the open backend cannot provide is a loud [`Capability`] error,
//! never a silently wrong handle.
//!
//! [`Capability`]: crate::error::HistoryError::Capability

use std::any::Any;

use deadpool_postgres::Pool;
use tracing::debug;

use crate::error::{HistoryError, Result};

/// PostgreSQL connection capability: what [`ImportSession::connection`]
/// yields for a postgres-backed session.
pub type PgConnection = deadpool_postgres::Object;

/// The live connection+transaction pair scoping one atomic import.
///
/// The transaction is driven with explicit `BEGIN`/`COMMIT`/`ROLLBACK` on
/// the owned connection; the facade guarantees exactly one of
/// [`commit`](Self::commit) or [`rollback`](Self::rollback) runs before the
/// session drops, so a connection never returns to the pool mid-transaction.
pub struct ImportSession {
    backend: &'static str,
    schema: String,
    conn: Box<dyn Any + Send + Sync>,
}

impl ImportSession {
    /// Open a postgres session: take one pooled connection and begin its
    /// transaction.
    pub(crate) async fn open_postgres(pool: &Pool, schema: &str) -> Result<Self> {
        let conn = pool
            .get()
            .await
            .map_err(|e| HistoryError::pool(e, "opening import session"))?;
        conn.batch_execute("BEGIN").await?;
        debug!("import session opened (postgres)");
        Ok(Self {
            backend: "postgres",
            schema: schema.to_string(),
            conn: Box::new(conn),
        })
    }

    /// Backend identifier for the open session.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Store schema the session writes into.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Capability lookup: the live connection as backend connection type `C`.
    ///
    /// Fails loudly when `C` is not the open backend's connection type.
    pub fn connection<C: Any>(&self) -> Result<&C> {
        self.conn
            .downcast_ref::<C>()
            .ok_or(HistoryError::Capability {
                requested: std::any::type_name::<C>(),
                backend: self.backend,
            })
    }

    /// Convenience lookup for the postgres capability.
    pub fn postgres(&self) -> Result<&PgConnection> {
        self.connection::<PgConnection>()
    }

    /// Commit the session's transaction and release the connection.
    pub(crate) async fn commit(self) -> Result<()> {
        self.postgres()?.batch_execute("COMMIT").await?;
        debug!("import session committed");
        Ok(())
    }

    /// Roll the session's transaction back and release the connection.
    pub(crate) async fn rollback(self) -> Result<()> {
        self.postgres()?.batch_execute("ROLLBACK").await?;
        debug!("import session rolled back");
        Ok(())
    }
}
