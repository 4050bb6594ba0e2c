//! Backend write strategies.
//!
//! Two interchangeable ways to move materialized rows into the store, both
//! fed by the same mapping and hasher so row content is strategy-independent:
//!
//! - [`BulkCopy`]: stage every row into one COPY BINARY buffer and ship it
//!   in a single round trip.
//! - [`StreamedInsert`]: prepare the mapping's insert statement once, then
//!   bind and execute per record.

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use futures::SinkExt;
use tokio_postgres::types::ToSql;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::mapping::{InsertPlan, MaterializedRow};
use crate::core::value::StorageValue;
use crate::error::{HistoryError, Result};
use crate::store::session::ImportSession;

/// Write a batch of materialized rows through the open session.
#[async_trait]
pub trait WriteStrategy: Send + Sync {
    /// Strategy identifier for logs.
    fn name(&self) -> &'static str;

    /// Write all rows for one table; returns the number written.
    ///
    /// Runs on the session's transaction. Partial writes after cancellation
    /// are acceptable because the facade rolls the transaction back.
    async fn write_rows(
        &self,
        session: &ImportSession,
        plan: &InsertPlan,
        rows: &[MaterializedRow],
        cancel: &CancellationToken,
    ) -> Result<u64>;
}

/// Bulk strategy: one COPY BINARY round trip per table.
#[derive(Debug, Default)]
pub struct BulkCopy;

#[async_trait]
impl WriteStrategy for BulkCopy {
    fn name(&self) -> &'static str {
        "bulk"
    }

    async fn write_rows(
        &self,
        session: &ImportSession,
        plan: &InsertPlan,
        rows: &[MaterializedRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        if cancel.is_cancelled() {
            return Err(HistoryError::Cancelled);
        }

        let client = session.postgres()?;
        let sink = client.copy_in(&plan.copy_sql).await?;

        let mut buf = BytesMut::with_capacity(rows.len() * 256);

        // Header
        buf.put_slice(b"PGCOPY\n\xff\r\n\0");
        buf.put_i32(0); // flags
        buf.put_i32(0); // extension area length

        // snapshot_id + mapped columns + record_hash
        let field_count = (plan.columns.len() + 2) as i16;
        for row in rows {
            buf.put_i16(field_count);

            buf.put_i32(8);
            buf.put_i64(row.snapshot_id);

            for value in &row.values {
                write_binary_value(&mut buf, value);
            }

            buf.put_i32(row.record_hash.len() as i32);
            buf.put_slice(&row.record_hash);
        }

        // Trailer
        buf.put_i16(-1);

        tokio::pin!(sink);
        sink.send(buf.freeze()).await?;
        sink.finish().await?;

        debug!("bulk copied {} rows into {}", rows.len(), plan.table);
        Ok(rows.len() as u64)
    }
}

/// Streaming strategy: one prepared statement, one execute per record.
#[derive(Debug, Default)]
pub struct StreamedInsert;

#[async_trait]
impl WriteStrategy for StreamedInsert {
    fn name(&self) -> &'static str {
        "streamed"
    }

    async fn write_rows(
        &self,
        session: &ImportSession,
        plan: &InsertPlan,
        rows: &[MaterializedRow],
        cancel: &CancellationToken,
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let client = session.postgres()?;
        let stmt = client.prepare(&plan.insert_sql).await?;

        let mut written = 0u64;
        for row in rows {
            if cancel.is_cancelled() {
                return Err(HistoryError::Cancelled);
            }

            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(row.values.len() + 2);
            params.push(&row.snapshot_id);
            for value in &row.values {
                params.push(value);
            }
            params.push(&row.record_hash);

            written += client.execute(&stmt, &params).await?;
        }

        debug!("streamed {} rows into {}", written, plan.table);
        Ok(written)
    }
}

/// Encode one value in PostgreSQL COPY BINARY field format.
///
/// Format per field: i32 byte length (-1 for NULL) followed by the payload.
fn write_binary_value(buf: &mut BytesMut, value: &StorageValue) {
    match value {
        StorageValue::Null(_) => {
            buf.put_i32(-1);
        }
        StorageValue::Boolean(b) => {
            buf.put_i32(1);
            buf.put_u8(u8::from(*b));
        }
        // Bytes widen to smallint on the wire; PostgreSQL has no int1.
        StorageValue::Byte(v) => {
            buf.put_i32(2);
            buf.put_i16(i16::from(*v));
        }
        StorageValue::Int16(v) => {
            buf.put_i32(2);
            buf.put_i16(*v);
        }
        StorageValue::Int32(v) => {
            buf.put_i32(4);
            buf.put_i32(*v);
        }
        StorageValue::Float(v) => {
            buf.put_i32(8);
            buf.put_f64(*v);
        }
        StorageValue::Text(s) => {
            let bytes = s.as_bytes();
            buf.put_i32(bytes.len() as i32);
            buf.put_slice(bytes);
        }
        StorageValue::DateTime(dt) => {
            // PostgreSQL timestamptz: microseconds since 2000-01-01 UTC
            let epoch = chrono::NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let micros = (dt.naive_utc() - epoch).num_microseconds().unwrap_or(0);
            buf.put_i32(8);
            buf.put_i64(micros);
        }
        StorageValue::Blob(b) => {
            buf.put_i32(b.len() as i32);
            buf.put_slice(b);
        }
    }
}
