#![cfg(feature = "sqlite")]

use lazy_tx::prelude::*;
use tempfile::tempdir;

fn unique_db_path(prefix: &str) -> String {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join(format!("{prefix}.db"));
    // Leak the tempdir so the file persists for the duration of the test binary.
    std::mem::forget(dir);
    path.to_string_lossy().into_owned()
}

async fn seeded_proxy() -> Result<LazySqliteConnection, LazyTxError> {
    let mut proxy = connect_lazy(SqliteOptions::in_memory(), LazyTxOptions::default()).await?;
    proxy
        .execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
        .await?;
    Ok(proxy)
}

async fn count(proxy: &mut LazySqliteConnection) -> Result<i64, LazyTxError> {
    let rs = proxy
        .execute_select("SELECT COUNT(*) AS n FROM items", &[])
        .await?;
    Ok(*rs.results[0].get("n").and_then(RowValues::as_int).unwrap_or(&-1))
}

#[tokio::test]
async fn empty_transaction_never_reaches_sqlite() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = seeded_proxy().await?;

    proxy.begin_transaction(TxAction::begin()).await?;
    assert_eq!(proxy.state(), ProxyState::LazyPending);
    // Would fail on the driver ("no transaction is active") if it were forwarded.
    proxy.end_transaction(TxAction::Commit).await?;

    assert!(!proxy.underlying().in_transaction());
    assert_eq!(proxy.state(), ProxyState::LazyIdle);
    Ok(())
}

#[tokio::test]
async fn first_statement_opens_the_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = seeded_proxy().await?;

    proxy.begin_transaction(TxAction::begin()).await?;
    assert!(!proxy.underlying().in_transaction());
    proxy
        .execute_dml(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Text("widget".into())],
        )
        .await?;
    assert!(proxy.underlying().in_transaction());

    proxy.end_transaction(TxAction::Rollback).await?;
    assert!(!proxy.underlying().in_transaction());
    assert_eq!(count(&mut proxy).await?, 0);
    Ok(())
}

#[tokio::test]
async fn unused_savepoint_is_cancelled_inside_live_transaction()
-> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = seeded_proxy().await?;

    proxy.begin_scope(None).await?;
    proxy
        .execute_dml(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Text("outer".into())],
        )
        .await?;
    proxy.begin_scope(None).await?;
    proxy.rollback_scope().await?;
    assert_eq!(proxy.underlying().savepoint_depth(), 0);
    proxy.commit_scope().await?;

    assert_eq!(count(&mut proxy).await?, 1);
    Ok(())
}

#[tokio::test]
async fn nested_savepoint_rollback_keeps_outer_work() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = seeded_proxy().await?;

    proxy.begin_scope(None).await?;
    proxy.begin_scope(None).await?;
    // Both starts are replayed in order: BEGIN, then SAVEPOINT lazy_tx_sp_1.
    proxy
        .execute_dml(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Text("inner".into())],
        )
        .await?;
    assert_eq!(proxy.underlying().savepoint_depth(), 1);
    proxy.rollback_scope().await?;
    proxy
        .execute_dml(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &[RowValues::Int(2), RowValues::Text("outer".into())],
        )
        .await?;
    proxy.commit_scope().await?;

    let rs = proxy
        .execute_select("SELECT id FROM items ORDER BY id", &[])
        .await?;
    assert_eq!(rs.len(), 1);
    assert_eq!(rs.results[0].get("id"), Some(&RowValues::Int(2)));
    Ok(())
}

#[tokio::test]
async fn failed_begin_surfaces_at_first_statement() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = seeded_proxy().await?;

    proxy
        .begin_transaction(TxAction::begin_with(IsolationLevel::RepeatableRead))
        .await?;
    let err = proxy
        .execute_select("SELECT 1", &[])
        .await
        .expect_err("unsupported isolation must fail at materialization");
    assert!(matches!(err, LazyTxError::TransactionError(_)));
    assert!(!proxy.is_materializing());
    assert!(!proxy.has_pending());

    // The proxy is usable afterwards.
    assert_eq!(count(&mut proxy).await?, 0);
    Ok(())
}

#[tokio::test]
async fn uncommitted_work_is_isolated_until_commit() -> Result<(), Box<dyn std::error::Error>> {
    let path = unique_db_path("isolation");
    let mut writer = connect_lazy(
        SqliteOptionsBuilder::new(path.clone())
            .busy_timeout(std::time::Duration::from_millis(500))
            .finish(),
        LazyTxOptions::default(),
    )
    .await?;
    writer
        .execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
        .await?;
    let mut reader = SqliteOptionsBuilder::new(path).build().await?;

    writer.begin_transaction(TxAction::begin()).await?;
    writer
        .execute_dml(
            "INSERT INTO items (id, name) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Text("pending".into())],
        )
        .await?;
    let before = reader.execute_select("SELECT id FROM items", &[]).await?;
    assert!(before.is_empty());

    writer.end_transaction(TxAction::Commit).await?;
    let after = reader.execute_select("SELECT id FROM items", &[]).await?;
    assert_eq!(after.len(), 1);
    Ok(())
}

#[tokio::test]
async fn eager_mode_sends_begin_immediately() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = connect_lazy(
        SqliteOptions::in_memory(),
        LazyTxOptionsBuilder::new().lazy(false).build()?,
    )
    .await?;

    proxy.begin_transaction(TxAction::begin()).await?;
    assert!(proxy.underlying().in_transaction());
    proxy.end_transaction(TxAction::Commit).await?;

    let raw = proxy.into_inner().await?;
    assert!(!raw.in_transaction());
    Ok(())
}

#[tokio::test]
async fn timestamps_survive_a_deferred_transaction() -> Result<(), Box<dyn std::error::Error>> {
    let mut proxy = connect_lazy(SqliteOptions::in_memory(), LazyTxOptions::default()).await?;
    proxy
        .execute_batch("CREATE TABLE events (id INTEGER PRIMARY KEY, at TEXT NOT NULL);")
        .await?;
    let at = chrono::NaiveDate::from_ymd_opt(2025, 3, 4)
        .and_then(|d| d.and_hms_micro_opt(5, 6, 7, 890))
        .ok_or("bad date")?;

    proxy.begin_scope(None).await?;
    proxy
        .execute_dml(
            "INSERT INTO events (id, at) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Timestamp(at)],
        )
        .await?;
    proxy.commit_scope().await?;

    let rs = proxy.execute_select("SELECT at FROM events", &[]).await?;
    assert_eq!(rs.results[0].get("at").and_then(RowValues::as_timestamp), Some(at));
    Ok(())
}
