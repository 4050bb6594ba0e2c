//! Record-schema-agnostic mapping and hashing framework.
//!
//! This module defines the building blocks every import processor shares:
//!
//! - [`value`]: storage type tags and materialized values
//! - [`serialize`]: the canonical field encoding used for hashing
//! - [`hash`]: row and whole-source digests
//! - [`mapping`]: declarative column/table mappings and materialization

pub mod hash;
pub mod mapping;
pub mod serialize;
pub mod value;

pub use hash::{source_digest, RecordHasher};
pub use mapping::{ColumnMapping, InsertPlan, MaterializedRow, TableMapping};
pub use value::{StorageType, StorageValue};
