//! Snapshot model: one versioned, content-addressed import unit.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::core::hash::source_digest;
use crate::error::{HistoryError, Result};
use crate::source::ProjectExport;

/// Stable identity of the entity a sequence of snapshots describes,
/// formatted as `type://name` with the type lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetKey(String);

impl TargetKey {
    /// Derive the key from a target type and name.
    pub fn derive(target_type: &str, target_name: &str) -> Self {
        Self(format!(
            "{}://{}",
            target_type.to_lowercase(),
            target_name
        ))
    }

    /// Parse an explicit key string, validating its shape.
    pub fn parse(key: &str) -> Result<Self> {
        match key.split_once("://") {
            Some((kind, name)) if !kind.is_empty() && !name.is_empty() => {
                Ok(Self(format!("{}://{}", kind.to_lowercase(), name)))
            }
            _ => Err(HistoryError::Validation(format!(
                "malformed target key '{}': expected 'type://name'",
                key
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The `type` component.
    pub fn target_type(&self) -> &str {
        self.0.split_once("://").map(|(t, _)| t).unwrap_or("")
    }

    /// The `name` component.
    pub fn target_name(&self) -> &str {
        self.0.split_once("://").map(|(_, n)| n).unwrap_or("")
    }
}

impl std::fmt::Display for TargetKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One versioned import of a source export.
///
/// Built in memory by [`Snapshot::create`]; identity (`snapshot_id`,
/// `imported_at`) is assigned when the store inserts it, and the row is
/// immutable thereafter. The compressed bytes never change after `create`,
/// so [`Snapshot::get_source`] is safe under concurrent calls.
#[derive(Debug, Clone)]
pub struct Snapshot {
    snapshot_id: Option<i64>,
    target_key: TargetKey,
    target_type: String,
    target_name: String,
    is_partial: bool,
    schema_revision: String,
    software_revision: String,
    exported_at: DateTime<Utc>,
    imported_at: Option<DateTime<Utc>>,
    imported_by: String,
    imported_host: String,
    source_hash: Vec<u8>,
    source_data: Vec<u8>,
}

impl Snapshot {
    /// Build a snapshot from a parsed export.
    ///
    /// Fails with a validation error if the export lacks a resolvable target
    /// type or name. The whole-source hash is computed over the canonical
    /// serialization BEFORE compression; `source_data` is the gzip of those
    /// same bytes.
    pub fn create(export: &ProjectExport, target_key: Option<TargetKey>) -> Result<Snapshot> {
        if export.target_type.trim().is_empty() {
            return Err(HistoryError::Validation(
                "parsed export has no target type".into(),
            ));
        }
        if export.target_name.trim().is_empty() {
            return Err(HistoryError::Validation(
                "parsed export has no target name".into(),
            ));
        }

        let target_key = match target_key {
            Some(key) => key,
            None => TargetKey::derive(&export.target_type, &export.target_name),
        };

        let canonical = export.to_canonical_bytes()?;
        let source_hash = source_digest(&canonical);

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&canonical)?;
        let source_data = encoder.finish()?;

        Ok(Snapshot {
            snapshot_id: None,
            target_key,
            target_type: export.target_type.clone(),
            target_name: export.target_name.clone(),
            is_partial: export.is_partial,
            schema_revision: export.schema_revision.clone(),
            software_revision: export.software_revision.clone(),
            exported_at: export.exported_at,
            imported_at: None,
            imported_by: default_actor(),
            imported_host: default_host(),
            source_data,
            source_hash,
        })
    }

    /// Override the recorded import actor and host.
    pub fn with_importer(mut self, actor: impl Into<String>, host: impl Into<String>) -> Self {
        self.imported_by = actor.into();
        self.imported_host = host.into();
        self
    }

    /// Decompress and reparse the stored source.
    ///
    /// Idempotent and side-effect free: every call decompresses the
    /// immutable `source_data` afresh and returns an independent document.
    pub fn get_source(&self) -> Result<ProjectExport> {
        let mut decoder = GzDecoder::new(self.source_data.as_slice());
        let mut canonical = Vec::new();
        decoder
            .read_to_end(&mut canonical)
            .map_err(|e| HistoryError::Source(format!("decompression failed: {}", e)))?;
        ProjectExport::from_canonical_bytes(&canonical)
    }

    // ===== Accessors =====

    /// Store-assigned identity; `None` until inserted.
    pub fn snapshot_id(&self) -> Option<i64> {
        self.snapshot_id
    }

    pub fn target_key(&self) -> &TargetKey {
        &self.target_key
    }

    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    pub fn is_partial(&self) -> bool {
        self.is_partial
    }

    pub fn schema_revision(&self) -> &str {
        &self.schema_revision
    }

    pub fn software_revision(&self) -> &str {
        &self.software_revision
    }

    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }

    /// When the store imported this snapshot; `None` until inserted.
    pub fn imported_at(&self) -> Option<DateTime<Utc>> {
        self.imported_at
    }

    pub fn imported_by(&self) -> &str {
        &self.imported_by
    }

    pub fn imported_host(&self) -> &str {
        &self.imported_host
    }

    /// SHA-256 over the canonical source bytes, pre-compression.
    pub fn source_hash(&self) -> &[u8] {
        &self.source_hash
    }

    /// Gzip-compressed canonical source bytes.
    pub fn source_data(&self) -> &[u8] {
        &self.source_data
    }

    /// Attach store-assigned identity after insert.
    pub(crate) fn assign_identity(&mut self, snapshot_id: i64, imported_at: DateTime<Utc>) {
        self.snapshot_id = Some(snapshot_id);
        self.imported_at = Some(imported_at);
    }

    /// Rehydrate a snapshot from stored columns.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        snapshot_id: i64,
        target_key: TargetKey,
        target_type: String,
        target_name: String,
        is_partial: bool,
        schema_revision: String,
        software_revision: String,
        exported_at: DateTime<Utc>,
        imported_at: DateTime<Utc>,
        imported_by: String,
        imported_host: String,
        source_hash: Vec<u8>,
        source_data: Vec<u8>,
    ) -> Self {
        Snapshot {
            snapshot_id: Some(snapshot_id),
            target_key,
            target_type,
            target_name,
            is_partial,
            schema_revision,
            software_revision,
            exported_at,
            imported_at: Some(imported_at),
            imported_by,
            imported_host,
            source_hash,
            source_data,
        }
    }
}

fn default_actor() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into())
}
