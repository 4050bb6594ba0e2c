//! # export-history
//!
//! Content-addressed import history for versioned controller project
//! exports, persisted to PostgreSQL.
//!
//! This library provides the core mapping-and-import engine:
//!
//! - **Declarative column mappings** from typed records to relational rows
//! - **Deterministic record hashing**, independent of mapping declaration
//!   order, for change detection and cross-snapshot diffing
//! - **Snapshot lifecycle** with append / replace-latest / replace-all
//!   action policies applied atomically across every record table
//! - **Pluggable write strategies** (COPY BINARY bulk load or streamed
//!   prepared statements) behind one transactional session
//!
//! ## Example
//!
//! ```rust,no_run
//! use export_history::{
//!     CanonicalJsonParser, ExportParser, Snapshot, SnapshotAction, SnapshotStore, StoreConfig,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> export_history::Result<()> {
//!     let config = StoreConfig::load("store.yaml")?;
//!     let store = SnapshotStore::connect(&config).await?;
//!     let cancel = CancellationToken::new();
//!     store.migrate(&cancel).await?;
//!
//!     let raw = std::fs::read("line4.export")?;
//!     let export = CanonicalJsonParser.parse(&raw)?;
//!     let mut snapshot = Snapshot::create(&export, None)?;
//!     let id = store
//!         .add_snapshot(&mut snapshot, SnapshotAction::Append, &cancel)
//!         .await?;
//!     println!("imported snapshot {}", id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod import;
pub mod snapshot;
pub mod source;
pub mod store;

// Re-exports for convenient access
pub use config::{DatabaseConfig, ImportConfig, StoreConfig, WriteStrategyKind};
pub use crate::core::{
    ColumnMapping, InsertPlan, MaterializedRow, RecordHasher, StorageType, StorageValue,
    TableMapping,
};
pub use error::{HistoryError, Result};
pub use import::{BulkCopy, ImportProcessor, MappedProcessor, StreamedInsert, WriteStrategy};
pub use snapshot::{Snapshot, TargetKey};
pub use source::{CanonicalJsonParser, ExportParser, ProjectExport};
pub use store::{SnapshotAction, SnapshotInfo, SnapshotStore};
