//! Declarative column and table mappings.
//!
//! A [`TableMapping`] binds one record type to a destination table: an
//! ordered list of [`ColumnMapping`]s (declaration order, used for SQL text)
//! plus the table name. Materialization evaluates the getters in a separate
//! pass sorted by column name, so two mappings with the same columns in
//! different declared order produce identical record hashes. Do not fold the
//! two passes together: the name sort is what keeps stored hashes stable
//! across mapping refactors.

use crate::core::hash::RecordHasher;
use crate::core::value::{StorageType, StorageValue};
use crate::error::{HistoryError, Result};

/// Descriptor for one mapped column: name, storage type tag, and an erased
/// extraction function from the record type. Stateless and side-effect free.
pub struct ColumnMapping<R> {
    name: &'static str,
    storage_type: StorageType,
    getter: Box<dyn Fn(&R) -> Option<StorageValue> + Send + Sync>,
}

impl<R> ColumnMapping<R> {
    pub fn new(
        name: &'static str,
        storage_type: StorageType,
        getter: impl Fn(&R) -> Option<StorageValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            storage_type,
            getter: Box::new(getter),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn storage_type(&self) -> StorageType {
        self.storage_type
    }
}

impl<R> std::fmt::Debug for ColumnMapping<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnMapping")
            .field("name", &self.name)
            .field("storage_type", &self.storage_type)
            .finish()
    }
}

/// One materialized row, ready for either write strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedRow {
    /// Owning snapshot. Excluded from `record_hash`.
    pub snapshot_id: i64,
    /// Mapped values in column declaration order.
    pub values: Vec<StorageValue>,
    /// Digest over the name-sorted field values.
    pub record_hash: Vec<u8>,
}

/// Insert statements derived from a mapping, qualified with the store schema.
#[derive(Debug, Clone)]
pub struct InsertPlan {
    /// Schema-qualified, quoted table name.
    pub table: String,
    /// Mapped business columns in declaration order.
    pub columns: Vec<(&'static str, StorageType)>,
    /// Parameterized INSERT for the streamed strategy.
    pub insert_sql: String,
    /// COPY BINARY statement for the bulk strategy.
    pub copy_sql: String,
}

/// Ordered column mappings for one record type plus the destination table.
pub struct TableMapping<R> {
    table: &'static str,
    columns: Vec<ColumnMapping<R>>,
    /// Column indexes sorted by name (ordinal ascending); the hashing pass
    /// walks this order, never declaration order.
    hash_order: Vec<usize>,
}

impl<R> TableMapping<R> {
    /// Build a mapping from declared columns.
    ///
    /// Panics on duplicate column names: mappings are static declarations,
    /// and a duplicate is a defect in the declaring code.
    pub fn new(table: &'static str, columns: Vec<ColumnMapping<R>>) -> Self {
        let mut hash_order: Vec<usize> = (0..columns.len()).collect();
        hash_order.sort_by_key(|&i| columns[i].name);
        for pair in hash_order.windows(2) {
            assert!(
                columns[pair[0]].name != columns[pair[1]].name,
                "duplicate column '{}' in mapping for table '{}'",
                columns[pair[0]].name,
                table
            );
        }
        Self {
            table,
            columns,
            hash_order,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn columns(&self) -> &[ColumnMapping<R>] {
        &self.columns
    }

    /// Build the parameterized insert statement text.
    ///
    /// Column order follows declaration order for statement readability;
    /// placeholders are positional (`$1..$n`) with `snapshot_id` first and
    /// `record_hash` last.
    pub fn insert_statement(&self, schema: &str) -> String {
        let mut cols = Vec::with_capacity(self.columns.len() + 2);
        cols.push(quote_ident("snapshot_id"));
        cols.extend(self.columns.iter().map(|c| quote_ident(c.name)));
        cols.push(quote_ident("record_hash"));

        let params: Vec<String> = (1..=cols.len()).map(|i| format!("${}", i)).collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            qualify(schema, self.table),
            cols.join(", "),
            params.join(", ")
        )
    }

    /// Build the COPY statement text for the bulk strategy.
    pub fn copy_statement(&self, schema: &str) -> String {
        let mut cols = Vec::with_capacity(self.columns.len() + 2);
        cols.push(quote_ident("snapshot_id"));
        cols.extend(self.columns.iter().map(|c| quote_ident(c.name)));
        cols.push(quote_ident("record_hash"));

        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT BINARY)",
            qualify(schema, self.table),
            cols.join(", ")
        )
    }

    /// Derive the full insert plan for a store schema.
    pub fn plan(&self, schema: &str) -> InsertPlan {
        InsertPlan {
            table: qualify(schema, self.table),
            columns: self
                .columns
                .iter()
                .map(|c| (c.name, c.storage_type))
                .collect(),
            insert_sql: self.insert_statement(schema),
            copy_sql: self.copy_statement(schema),
        }
    }

    /// Materialize rows for a batch of records.
    ///
    /// Getters run once per record in the name-sorted hashing pass; `None`
    /// coerces to a typed NULL before serialization. A value whose type does
    /// not match its column's declared tag aborts the whole batch: type
    /// mismatches are mapping defects, never retried per row.
    pub fn materialize(&self, records: &[R], snapshot_id: i64) -> Result<Vec<MaterializedRow>> {
        let mut hasher = RecordHasher::new();
        let mut rows = Vec::with_capacity(records.len());
        // Scratch slots indexed by declaration position, reused per record.
        let mut slots: Vec<Option<StorageValue>> = Vec::with_capacity(self.columns.len());

        for record in records {
            slots.clear();
            slots.resize(self.columns.len(), None);

            for &i in &self.hash_order {
                let col = &self.columns[i];
                let value = (col.getter)(record)
                    .unwrap_or(StorageValue::Null(col.storage_type));
                if value.storage_type() != col.storage_type {
                    return Err(HistoryError::mapping(
                        self.table,
                        format!(
                            "column '{}' declared {} but getter produced {}",
                            col.name,
                            col.storage_type,
                            value.storage_type()
                        ),
                    ));
                }
                hasher.field(col.name, &value);
                slots[i] = Some(value);
            }

            let record_hash = hasher.finish();
            let values = slots
                .iter_mut()
                .map(|s| s.take().expect("every column slot filled by hash pass"))
                .collect();

            rows.push(MaterializedRow {
                snapshot_id,
                values,
                record_hash,
            });
        }

        Ok(rows)
    }
}

impl<R> std::fmt::Debug for TableMapping<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableMapping")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Quote a PostgreSQL identifier.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema.
pub(crate) fn qualify(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget {
        name: String,
        size: i32,
        comment: Option<String>,
    }

    fn widget_columns() -> Vec<ColumnMapping<Widget>> {
        vec![
            ColumnMapping::new("name", StorageType::Text, |w: &Widget| {
                Some(w.name.clone().into())
            }),
            ColumnMapping::new("size", StorageType::Int32, |w: &Widget| {
                Some(w.size.into())
            }),
            ColumnMapping::new("comment", StorageType::Text, |w: &Widget| {
                w.comment.clone().map(Into::into)
            }),
        ]
    }

    fn sample() -> Widget {
        Widget {
            name: "Conveyor".into(),
            size: 12,
            comment: None,
        }
    }

    #[test]
    fn test_insert_statement_declaration_order() {
        let mapping = TableMapping::new("widget", widget_columns());
        assert_eq!(
            mapping.insert_statement("export_history"),
            "INSERT INTO \"export_history\".\"widget\" \
             (\"snapshot_id\", \"name\", \"size\", \"comment\", \"record_hash\") \
             VALUES ($1, $2, $3, $4, $5)"
        );
    }

    #[test]
    fn test_copy_statement() {
        let mapping = TableMapping::new("widget", widget_columns());
        assert_eq!(
            mapping.copy_statement("export_history"),
            "COPY \"export_history\".\"widget\" \
             (\"snapshot_id\", \"name\", \"size\", \"comment\", \"record_hash\") \
             FROM STDIN WITH (FORMAT BINARY)"
        );
    }

    #[test]
    fn test_hash_independent_of_declaration_order() {
        let forward = TableMapping::new("widget", widget_columns());
        let mut reversed_cols = widget_columns();
        reversed_cols.reverse();
        let reversed = TableMapping::new("widget", reversed_cols);

        let records = [sample()];
        let a = forward.materialize(&records, 1).unwrap();
        let b = reversed.materialize(&records, 1).unwrap();

        assert_eq!(a[0].record_hash, b[0].record_hash);
        // Row buffers still follow their own declaration orders.
        assert_eq!(a[0].values[0], StorageValue::Text("Conveyor".into()));
        assert_eq!(b[0].values[2], StorageValue::Text("Conveyor".into()));
    }

    #[test]
    fn test_hash_excludes_snapshot_id() {
        let mapping = TableMapping::new("widget", widget_columns());
        let records = [sample()];
        let a = mapping.materialize(&records, 1).unwrap();
        let b = mapping.materialize(&records, 999).unwrap();
        assert_eq!(a[0].record_hash, b[0].record_hash);
    }

    #[test]
    fn test_single_field_change_isolated() {
        let mapping = TableMapping::new("widget", widget_columns());
        let records = [
            sample(),
            Widget {
                name: "Press".into(),
                size: 3,
                comment: Some("spare".into()),
            },
        ];
        let before = mapping.materialize(&records, 1).unwrap();

        let records = [
            Widget {
                size: 13,
                ..sample()
            },
            Widget {
                name: "Press".into(),
                size: 3,
                comment: Some("spare".into()),
            },
        ];
        let after = mapping.materialize(&records, 1).unwrap();

        assert_ne!(before[0].record_hash, after[0].record_hash);
        assert_eq!(before[1].record_hash, after[1].record_hash);
    }

    #[test]
    fn test_none_coerces_to_typed_null() {
        let mapping = TableMapping::new("widget", widget_columns());
        let rows = mapping.materialize(&[sample()], 1).unwrap();
        assert_eq!(rows[0].values[2], StorageValue::Null(StorageType::Text));
    }

    #[test]
    fn test_type_mismatch_aborts_batch() {
        let mapping = TableMapping::new(
            "widget",
            vec![ColumnMapping::new(
                "size",
                StorageType::Int32,
                |_: &Widget| Some(StorageValue::Text("not a number".into())),
            )],
        );
        let err = mapping.materialize(&[sample()], 1).unwrap_err();
        match err {
            HistoryError::Mapping { table, message } => {
                assert_eq!(table, "widget");
                assert!(message.contains("size"));
            }
            other => panic!("expected Mapping error, got {other:?}"),
        }
    }

    #[test]
    #[should_panic(expected = "duplicate column")]
    fn test_duplicate_column_panics() {
        TableMapping::new(
            "widget",
            vec![
                ColumnMapping::new("name", StorageType::Text, |_: &Widget| None),
                ColumnMapping::new("name", StorageType::Text, |_: &Widget| None),
            ],
        );
    }
}
