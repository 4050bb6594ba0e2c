//! Storage value types for record-to-row materialization.
//!
//! Every mapped column declares one of the storage type tags below; getters
//! produce [`StorageValue`]s that must match the declared tag. Both write
//! strategies and the record hasher consume the same values, which keeps
//! hashing independent of the backend write path.

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

/// Storage type tag carried by a column mapping.
///
/// NULL values carry their column's tag so the write path always knows the
/// expected wire encoding, mirroring how typed NULLs are handled in binary
/// protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Float,
    Text,
    DateTime,
    Blob,
}

impl StorageType {
    /// PostgreSQL column type used when declaring destination tables.
    pub fn pg_type(&self) -> &'static str {
        match self {
            StorageType::Boolean => "boolean",
            StorageType::Byte => "smallint",
            StorageType::Int16 => "smallint",
            StorageType::Int32 => "integer",
            StorageType::Float => "double precision",
            StorageType::Text => "text",
            StorageType::DateTime => "timestamptz",
            StorageType::Blob => "bytea",
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageType::Boolean => "boolean",
            StorageType::Byte => "byte",
            StorageType::Int16 => "int16",
            StorageType::Int32 => "int32",
            StorageType::Float => "float",
            StorageType::Text => "text",
            StorageType::DateTime => "datetime",
            StorageType::Blob => "blob",
        };
        f.write_str(name)
    }
}

/// One materialized column value.
///
/// Values are fully owned: rows are buffered between materialization and the
/// backend write, so there is no source buffer to borrow from.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    /// NULL with the declaring column's type tag.
    Null(StorageType),
    Boolean(bool),
    Byte(u8),
    Int16(i16),
    Int32(i32),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Blob(Vec<u8>),
}

impl StorageValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, StorageValue::Null(_))
    }

    /// Get the storage type tag for this value.
    #[must_use]
    pub fn storage_type(&self) -> StorageType {
        match self {
            StorageValue::Null(t) => *t,
            StorageValue::Boolean(_) => StorageType::Boolean,
            StorageValue::Byte(_) => StorageType::Byte,
            StorageValue::Int16(_) => StorageType::Int16,
            StorageValue::Int32(_) => StorageType::Int32,
            StorageValue::Float(_) => StorageType::Float,
            StorageValue::Text(_) => StorageType::Text,
            StorageValue::DateTime(_) => StorageType::DateTime,
            StorageValue::Blob(_) => StorageType::Blob,
        }
    }
}

// From implementations for common types
impl From<bool> for StorageValue {
    fn from(v: bool) -> Self {
        StorageValue::Boolean(v)
    }
}

impl From<u8> for StorageValue {
    fn from(v: u8) -> Self {
        StorageValue::Byte(v)
    }
}

impl From<i16> for StorageValue {
    fn from(v: i16) -> Self {
        StorageValue::Int16(v)
    }
}

impl From<i32> for StorageValue {
    fn from(v: i32) -> Self {
        StorageValue::Int32(v)
    }
}

impl From<f64> for StorageValue {
    fn from(v: f64) -> Self {
        StorageValue::Float(v)
    }
}

impl From<String> for StorageValue {
    fn from(v: String) -> Self {
        StorageValue::Text(v)
    }
}

impl From<&str> for StorageValue {
    fn from(v: &str) -> Self {
        StorageValue::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for StorageValue {
    fn from(v: DateTime<Utc>) -> Self {
        StorageValue::DateTime(v)
    }
}

impl From<Vec<u8>> for StorageValue {
    fn from(v: Vec<u8>) -> Self {
        StorageValue::Blob(v)
    }
}

impl ToSql for StorageValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            StorageValue::Null(_) => Ok(IsNull::Yes),
            StorageValue::Boolean(v) => v.to_sql(ty, out),
            // No single-byte integer type in PostgreSQL; bytes widen to smallint.
            StorageValue::Byte(v) => i16::from(*v).to_sql(ty, out),
            StorageValue::Int16(v) => v.to_sql(ty, out),
            StorageValue::Int32(v) => v.to_sql(ty, out),
            StorageValue::Float(v) => v.to_sql(ty, out),
            StorageValue::Text(v) => v.to_sql(ty, out),
            StorageValue::DateTime(v) => v.to_sql(ty, out),
            StorageValue::Blob(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::BOOL
            || *ty == Type::INT2
            || *ty == Type::INT4
            || *ty == Type::FLOAT8
            || *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::TIMESTAMPTZ
            || *ty == Type::BYTEA
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_null() {
        assert!(StorageValue::Null(StorageType::Text).is_null());
        assert!(!StorageValue::Int32(42).is_null());
    }

    #[test]
    fn test_null_keeps_declared_tag() {
        let v = StorageValue::Null(StorageType::DateTime);
        assert_eq!(v.storage_type(), StorageType::DateTime);
    }

    #[test]
    fn test_from_implementations() {
        let v: StorageValue = 42i32.into();
        assert_eq!(v, StorageValue::Int32(42));

        let v: StorageValue = "hello".into();
        assert_eq!(v, StorageValue::Text("hello".to_string()));

        let v: StorageValue = 7u8.into();
        assert_eq!(v, StorageValue::Byte(7));
    }

    #[test]
    fn test_pg_types() {
        assert_eq!(StorageType::Byte.pg_type(), "smallint");
        assert_eq!(StorageType::Float.pg_type(), "double precision");
        assert_eq!(StorageType::DateTime.pg_type(), "timestamptz");
    }
}
