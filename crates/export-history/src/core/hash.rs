//! Deterministic digests for rows and whole sources.

use sha2::{Digest, Sha256};

use crate::core::serialize::append_field;
use crate::core::value::StorageValue;

/// Accumulates canonically serialized fields and digests them.
///
/// Callers feed fields in column-name order (the mapping layer owns that
/// sort); the hasher itself is order-preserving. The buffer is reused across
/// records to avoid per-row allocation.
#[derive(Debug, Default)]
pub struct RecordHasher {
    buf: String,
}

impl RecordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one named field in canonical form.
    pub fn field(&mut self, name: &str, value: &StorageValue) {
        append_field(&mut self.buf, name, value);
    }

    /// Digest the accumulated fields and reset for the next record.
    pub fn finish(&mut self) -> Vec<u8> {
        let digest = Sha256::digest(self.buf.as_bytes());
        self.buf.clear();
        digest.to_vec()
    }
}

/// SHA-256 over canonical source bytes, computed before compression.
pub fn source_digest(canonical: &[u8]) -> Vec<u8> {
    Sha256::digest(canonical).to_vec()
}
