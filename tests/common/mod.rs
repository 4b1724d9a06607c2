#![allow(dead_code)]

use std::time::Duration;

use sql_txn::prelude::*;
use tempfile::TempDir;

/// Executor over a fresh file database; keep the `TempDir` alive for the test.
pub async fn file_executor(
    max_size: u32,
) -> Result<(TempDir, TransactionExecutor), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("txn.db");
    let executor = TransactionExecutor::sqlite_builder(path.to_string_lossy().into_owned())
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(5))
        .build()
        .await?;
    Ok((dir, executor))
}

pub async fn setup_ledger(executor: &TransactionExecutor) -> Result<(), SqlTxnError> {
    executor
        .execute_batch(
            "CREATE TABLE ledger (
                id INTEGER PRIMARY KEY,
                amount INTEGER NOT NULL,
                memo TEXT
            );",
        )
        .await
}

pub async fn count_rows(executor: &TransactionExecutor, table: &str) -> Result<i64, SqlTxnError> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    executor
        .query(SelectQuery::new(
            move |conn| conn.prepare(&sql),
            |rows| match rows.next_row()? {
                Some(row) => row.get::<i64>(0),
                None => Ok(0),
            },
        ))
        .await
}

/// Every connection the pool has opened is idle again.
pub fn assert_all_released(executor: &TransactionExecutor) {
    let status = executor.state();
    assert_eq!(
        status.connections, status.idle_connections,
        "connections still checked out: {status:?}"
    );
}
