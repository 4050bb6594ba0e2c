//! Live-database properties of the snapshot store.
//!
//! These tests need a running PostgreSQL server and are gated on
//! `EXPORT_HISTORY_TEST_HOST`; without it every test skips and passes.
//! Optional overrides: `EXPORT_HISTORY_TEST_PORT`, `EXPORT_HISTORY_TEST_DB`,
//! `EXPORT_HISTORY_TEST_USER`, `EXPORT_HISTORY_TEST_PASSWORD`.
//!
//! Each test works in its own schema, recreated from scratch, so tests can
//! run concurrently against one server.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use export_history::import::processors::make_strategy;
use export_history::source::records::*;
use export_history::{
    DatabaseConfig, HistoryError, ImportConfig, ImportProcessor, ProjectExport, Snapshot,
    SnapshotAction, SnapshotStore, StoreConfig, TargetKey, WriteStrategyKind,
};

fn test_config(schema: &str, strategy: WriteStrategyKind) -> Option<StoreConfig> {
    let host = match std::env::var("EXPORT_HISTORY_TEST_HOST") {
        Ok(host) => host,
        Err(_) => {
            eprintln!("skipping: EXPORT_HISTORY_TEST_HOST not set");
            return None;
        }
    };
    let env = |key: &str, fallback: &str| {
        std::env::var(key).unwrap_or_else(|_| fallback.to_string())
    };
    Some(StoreConfig {
        database: DatabaseConfig {
            host,
            port: env("EXPORT_HISTORY_TEST_PORT", "5432").parse().unwrap(),
            database: env("EXPORT_HISTORY_TEST_DB", "postgres"),
            user: env("EXPORT_HISTORY_TEST_USER", "postgres"),
            password: env("EXPORT_HISTORY_TEST_PASSWORD", "postgres"),
            schema: schema.to_string(),
            ssl_mode: "disable".to_string(),
            pool_size: 4,
        },
        import: ImportConfig {
            write_strategy: strategy,
        },
    })
}

/// Connect and recreate the given schema from scratch.
async fn fresh_store(schema: &str, strategy: WriteStrategyKind) -> Option<SnapshotStore> {
    let config = test_config(schema, strategy)?;
    let store = SnapshotStore::connect(&config).await.expect("connect");
    let cancel = CancellationToken::new();
    store.drop_storage(&cancel).await.expect("drop schema");
    store.migrate(&cancel).await.expect("migrate");
    Some(store)
}

/// Raw client for row-count assertions outside the store API.
async fn raw_client() -> tokio_postgres::Client {
    let env = |key: &str, fallback: &str| {
        std::env::var(key).unwrap_or_else(|_| fallback.to_string())
    };
    let conn_str = format!(
        "host={} port={} dbname={} user={} password={}",
        env("EXPORT_HISTORY_TEST_HOST", "localhost"),
        env("EXPORT_HISTORY_TEST_PORT", "5432"),
        env("EXPORT_HISTORY_TEST_DB", "postgres"),
        env("EXPORT_HISTORY_TEST_USER", "postgres"),
        env("EXPORT_HISTORY_TEST_PASSWORD", "postgres"),
    );
    let (client, connection) = tokio_postgres::connect(&conn_str, tokio_postgres::NoTls)
        .await
        .expect("raw connection");
    tokio::spawn(connection);
    client
}

async fn record_hashes(
    client: &tokio_postgres::Client,
    schema: &str,
    table: &str,
) -> Vec<String> {
    client
        .query(
            &format!(
                "SELECT encode(record_hash, 'hex') FROM {}.{} ORDER BY 1",
                schema, table
            ),
            &[],
        )
        .await
        .unwrap()
        .iter()
        .map(|row| row.get(0))
        .collect()
}

async fn count_rows(client: &tokio_postgres::Client, schema: &str, table: &str) -> i64 {
    client
        .query_one(&format!("SELECT COUNT(*) FROM {}.{}", schema, table), &[])
        .await
        .map(|row| row.get(0))
        .unwrap_or(0)
}

fn export_for(name: &str) -> ProjectExport {
    ProjectExport {
        target_type: "Controller".into(),
        target_name: name.into(),
        schema_revision: "2.11".into(),
        software_revision: "33.01".into(),
        exported_at: Utc.with_ymd_and_hms(2024, 3, 9, 6, 15, 0).unwrap(),
        is_partial: false,
        controller: Some(ControllerRecord {
            name: name.into(),
            processor_type: "1756-L83E".into(),
            firmware_major: 33,
            firmware_minor: 11,
            comment: None,
        }),
        modules: vec![ModuleRecord {
            name: "LocalENB".into(),
            catalog_number: "1756-EN2T".into(),
            vendor_id: 1,
            product_code: 166,
            slot: Some(1),
            comment: None,
        }],
        data_types: vec![],
        programs: vec![ProgramRecord {
            name: "MainProgram".into(),
            main_routine: Some("MainRoutine".into()),
            disabled: false,
            comment: None,
        }],
        routines: vec![RoutineRecord {
            program_name: "MainProgram".into(),
            name: "MainRoutine".into(),
            routine_type: "RLL".into(),
            comment: None,
        }],
        tags: vec![
            TagRecord {
                scope: "controller".into(),
                name: "Motor1".into(),
                data_type: "MotorData".into(),
                dimensions: None,
                radix: None,
                constant: false,
                comment: Some("main drive".into()),
            },
            TagRecord {
                scope: "MainProgram".into(),
                name: "CycleCount".into(),
                data_type: "DINT".into(),
                dimensions: None,
                radix: Some("Decimal".into()),
                constant: false,
                comment: None,
            },
        ],
        rungs: vec![RungRecord {
            program_name: "MainProgram".into(),
            routine_name: "MainRoutine".into(),
            number: 0,
            rung_type: "N".into(),
            text: "XIC(Start)OTE(Motor1.Run);".into(),
            comment: None,
        }],
    }
}

async fn import(
    store: &SnapshotStore,
    name: &str,
    action: SnapshotAction,
) -> export_history::Result<i64> {
    let mut snapshot = Snapshot::create(&export_for(name), None)?;
    store
        .add_snapshot(&mut snapshot, action, &CancellationToken::new())
        .await
}

/// A processor that always fails, registered last to prove atomicity.
struct FailingProcessor;

#[async_trait]
impl ImportProcessor for FailingProcessor {
    fn record_kind(&self) -> &'static str {
        "failing"
    }

    async fn process(
        &self,
        _snapshot: &Snapshot,
        _session: &export_history::store::ImportSession,
        _cancel: &CancellationToken,
    ) -> export_history::Result<u64> {
        Err(HistoryError::Validation("forced failure".into()))
    }
}

#[tokio::test]
async fn test_add_snapshot_requires_migration() {
    let Some(config) = test_config("eh_t_unmigrated", WriteStrategyKind::Bulk) else {
        return;
    };
    let store = SnapshotStore::connect(&config).await.expect("connect");
    let cancel = CancellationToken::new();
    store.drop_storage(&cancel).await.expect("drop schema");

    let err = import(&store, "Line1", SnapshotAction::Append)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::MigrationRequired { .. }), "{err}");
}

#[tokio::test]
async fn test_append_twice_lists_two() {
    let Some(store) = fresh_store("eh_t_append", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();

    let first = import(&store, "Line1", SnapshotAction::Append).await.unwrap();
    let second = import(&store, "Line1", SnapshotAction::Append).await.unwrap();
    assert_ne!(first, second);

    let key = TargetKey::parse("controller://Line1").unwrap();
    let listed = store.list_snapshots(Some(&key), &cancel).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.target_key == "controller://Line1"));
}

#[tokio::test]
async fn test_replace_latest_leaves_only_new_as_latest() {
    let Some(store) = fresh_store("eh_t_replace_latest", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();
    let key = TargetKey::parse("controller://Line2").unwrap();

    import(&store, "Line2", SnapshotAction::Append).await.unwrap();
    let new_id = import(&store, "Line2", SnapshotAction::ReplaceLatest)
        .await
        .unwrap();

    let listed = store.list_snapshots(Some(&key), &cancel).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].snapshot_id, new_id);

    let latest = store.get_snapshot_latest(&key, &cancel).await.unwrap().unwrap();
    assert_eq!(latest.snapshot_id(), Some(new_id));
}

#[tokio::test]
async fn test_replace_all_scoped_to_one_target() {
    let Some(store) = fresh_store("eh_t_replace_all", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();

    import(&store, "LineX", SnapshotAction::Append).await.unwrap();
    import(&store, "LineX", SnapshotAction::Append).await.unwrap();
    let y_id = import(&store, "LineY", SnapshotAction::Append).await.unwrap();

    let new_id = import(&store, "LineX", SnapshotAction::ReplaceAll)
        .await
        .unwrap();

    let x_key = TargetKey::parse("controller://LineX").unwrap();
    let x_listed = store.list_snapshots(Some(&x_key), &cancel).await.unwrap();
    assert_eq!(x_listed.len(), 1);
    assert_eq!(x_listed[0].snapshot_id, new_id);

    let y_key = TargetKey::parse("controller://LineY").unwrap();
    let y_listed = store.list_snapshots(Some(&y_key), &cancel).await.unwrap();
    assert_eq!(y_listed.len(), 1);
    assert_eq!(y_listed[0].snapshot_id, y_id);
}

#[tokio::test]
async fn test_failed_processor_rolls_back_everything() {
    let schema = "eh_t_rollback";
    let Some(store) = fresh_store(schema, WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();

    let mut processors =
        export_history::import::standard_processors(make_strategy(WriteStrategyKind::Bulk));
    processors.push(Box::new(FailingProcessor));
    let store = store.with_processors(processors);

    let err = import(&store, "Line3", SnapshotAction::Append)
        .await
        .unwrap_err();
    assert!(matches!(err, HistoryError::Validation(_)));

    // Nothing committed anywhere: no snapshot, no target, no record rows.
    let listed = store.list_snapshots(None, &cancel).await.unwrap();
    assert!(listed.is_empty());

    let client = raw_client().await;
    assert_eq!(count_rows(&client, schema, "target").await, 0);
    assert_eq!(count_rows(&client, schema, "snapshot").await, 0);
    for table in ["controller", "module", "program", "routine", "tag", "rung"] {
        assert_eq!(count_rows(&client, schema, table).await, 0, "{table}");
    }
}

#[tokio::test]
async fn test_failed_replace_keeps_prior_snapshots() {
    // The action policy's deletes share the import transaction, so a failed
    // insert phase must leave the target's history exactly as it was.
    let Some(store) = fresh_store("eh_t_replace_fail", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();
    let key = TargetKey::parse("controller://Line5").unwrap();

    let prior = import(&store, "Line5", SnapshotAction::Append).await.unwrap();

    let mut processors =
        export_history::import::standard_processors(make_strategy(WriteStrategyKind::Bulk));
    processors.push(Box::new(FailingProcessor));
    let store = store.with_processors(processors);

    for action in [SnapshotAction::ReplaceLatest, SnapshotAction::ReplaceAll] {
        let err = import(&store, "Line5", action).await.unwrap_err();
        assert!(matches!(err, HistoryError::Validation(_)));

        let listed = store.list_snapshots(Some(&key), &cancel).await.unwrap();
        assert_eq!(listed.len(), 1, "{action:?}");
        assert_eq!(listed[0].snapshot_id, prior, "{action:?}");
    }
}

#[tokio::test]
async fn test_delete_before_date_scoped_to_target() {
    let Some(store) = fresh_store("eh_t_delete_before", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();

    let old_id = import(&store, "LineA", SnapshotAction::Append).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let new_id = import(&store, "LineA", SnapshotAction::Append).await.unwrap();
    let other_id = import(&store, "LineB", SnapshotAction::Append).await.unwrap();

    let a_key = TargetKey::parse("controller://LineA").unwrap();
    let listed = store.list_snapshots(Some(&a_key), &cancel).await.unwrap();
    let cutoff = listed
        .iter()
        .find(|s| s.snapshot_id == new_id)
        .unwrap()
        .imported_at;

    let deleted = store
        .delete_snapshots_before(&a_key, cutoff, &cancel)
        .await
        .unwrap();
    assert_eq!(deleted, 1);

    let remaining = store.list_snapshots(None, &cancel).await.unwrap();
    let ids: Vec<i64> = remaining.iter().map(|s| s.snapshot_id).collect();
    assert!(!ids.contains(&old_id));
    assert!(ids.contains(&new_id));
    assert!(ids.contains(&other_id));
}

#[tokio::test]
async fn test_delete_for_target_removes_target() {
    let Some(store) = fresh_store("eh_t_delete_target", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();
    let key = TargetKey::parse("controller://LineC").unwrap();

    import(&store, "LineC", SnapshotAction::Append).await.unwrap();
    import(&store, "LineC", SnapshotAction::Append).await.unwrap();

    let deleted = store
        .delete_snapshots_for_target(&key, &cancel)
        .await
        .unwrap();
    assert_eq!(deleted, 2);
    assert!(store.list_snapshots(Some(&key), &cancel).await.unwrap().is_empty());

    // Target is recreated lazily on the next import.
    import(&store, "LineC", SnapshotAction::Append).await.unwrap();
    assert_eq!(
        store.list_snapshots(Some(&key), &cancel).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_bulk_and_streamed_write_identical_hashes() {
    let Some(bulk_store) = fresh_store("eh_t_bulk", WriteStrategyKind::Bulk).await else {
        return;
    };
    let streamed_store = fresh_store("eh_t_streamed", WriteStrategyKind::Streamed)
        .await
        .unwrap();

    import(&bulk_store, "LineH", SnapshotAction::Append).await.unwrap();
    import(&streamed_store, "LineH", SnapshotAction::Append)
        .await
        .unwrap();

    let client = raw_client().await;
    for table in ["controller", "tag", "rung"] {
        let bulk_hashes = record_hashes(&client, "eh_t_bulk", table).await;
        let streamed_hashes = record_hashes(&client, "eh_t_streamed", table).await;
        assert!(!bulk_hashes.is_empty(), "{table}");
        assert_eq!(bulk_hashes, streamed_hashes, "{table}");
    }
}

#[tokio::test]
async fn test_stored_snapshot_round_trips_source() {
    let Some(store) = fresh_store("eh_t_roundtrip", WriteStrategyKind::Bulk).await else {
        return;
    };
    let cancel = CancellationToken::new();

    let export = export_for("LineR");
    let mut snapshot = Snapshot::create(&export, None).unwrap();
    let id = store
        .add_snapshot(&mut snapshot, SnapshotAction::Append, &cancel)
        .await
        .unwrap();

    let stored = store.get_snapshot_by_id(id, &cancel).await.unwrap().unwrap();
    assert_eq!(stored.source_hash(), snapshot.source_hash());
    assert_eq!(stored.get_source().unwrap(), export);

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let err = import_with_token(&store, "LineR", &cancelled).await.unwrap_err();
    assert!(matches!(err, HistoryError::Cancelled));
}

async fn import_with_token(
    store: &SnapshotStore,
    name: &str,
    cancel: &CancellationToken,
) -> export_history::Result<i64> {
    let mut snapshot = Snapshot::create(&export_for(name), None)?;
    store
        .add_snapshot(&mut snapshot, SnapshotAction::Append, cancel)
        .await
}
