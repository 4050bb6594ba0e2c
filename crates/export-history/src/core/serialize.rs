//! Canonical field encoding for record hashing.
//!
//! Every hashed field is appended as `\u{001E}name\u{001F}value` where the
//! value rendering is locale-independent:
//!
//! - NULLs: the symbol-for-null sentinel `\u{2400}`
//! - Text: CRLF normalized to LF
//! - Booleans: `true` / `false`
//! - Integers: decimal
//! - Floats: shortest round-trip decimal form
//! - DateTimes: UTC `YYYY-MM-DDTHH:MM:SS.ffffff`
//! - Blobs: lowercase hex
//!
//! The two control characters cannot occur in ordinary values, so field
//! boundaries never collide with content. This encoding is the hash input
//! contract: changing any rule invalidates every stored `record_hash`.

use std::fmt::Write;

use crate::core::value::StorageValue;

/// Record separator preceding every field name.
pub const FIELD_SEP: char = '\u{001E}';

/// Unit separator between a field name and its value.
pub const NAME_VALUE_SEP: char = '\u{001F}';

/// Rendering of a NULL value.
pub const NULL_SENTINEL: char = '\u{2400}';

/// Append one `(name, value)` pair in canonical form.
pub fn append_field(buf: &mut String, name: &str, value: &StorageValue) {
    buf.push(FIELD_SEP);
    buf.push_str(name);
    buf.push(NAME_VALUE_SEP);
    append_canonical(buf, value);
}

/// Append the canonical text of a single value.
fn append_canonical(buf: &mut String, value: &StorageValue) {
    match value {
        StorageValue::Null(_) => buf.push(NULL_SENTINEL),
        StorageValue::Boolean(v) => buf.push_str(if *v { "true" } else { "false" }),
        StorageValue::Byte(v) => {
            let _ = write!(buf, "{}", v);
        }
        StorageValue::Int16(v) => {
            let _ = write!(buf, "{}", v);
        }
        StorageValue::Int32(v) => {
            let _ = write!(buf, "{}", v);
        }
        StorageValue::Float(v) => {
            // Rust's Display for f64 is the shortest exact round-trip form,
            // independent of locale.
            let _ = write!(buf, "{}", v);
        }
        StorageValue::Text(v) => {
            if v.contains("\r\n") {
                buf.push_str(&v.replace("\r\n", "\n"));
            } else {
                buf.push_str(v);
            }
        }
        StorageValue::DateTime(v) => {
            let _ = write!(buf, "{}", v.format("%Y-%m-%dT%H:%M:%S%.6f"));
        }
        StorageValue::Blob(v) => {
            for b in v {
                let _ = write!(buf, "{:02x}", b);
            }
        }
    }
}
