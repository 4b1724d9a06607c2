mod common;

use std::time::Duration;

use common::{count_rows, setup_ledger};
use sql_txn::prelude::*;

#[tokio::test(flavor = "current_thread")]
async fn executor_resolves_named_source() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let db_path = dir.path().join("orders.db");
    let registry_path = dir.path().join("sources.json");
    let registry_json = serde_json::json!({
        "orders": {
            "db_path": db_path.to_string_lossy(),
            "max_size": 2,
            "busy_timeout_ms": 1000
        }
    });
    std::fs::write(&registry_path, registry_json.to_string())?;

    let registry = DataSourceRegistry::from_path(&registry_path)?;
    let executor = TransactionExecutor::from_registry(&registry, "orders").await?;
    setup_ledger(&executor).await?;
    executor
        .update(
            "INSERT INTO ledger (id, amount) VALUES (?1, ?2)",
            &[RowValues::Int(1), RowValues::Int(5)],
        )
        .await?;
    assert_eq!(count_rows(&executor, "ledger").await?, 1);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_source_fails_construction() {
    let registry = DataSourceRegistry::new();
    let err = TransactionExecutor::from_registry(&registry, "orders")
        .await
        .expect_err("nothing registered");
    assert!(matches!(err, SqlTxnError::ResolutionError(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn unopenable_database_fails_construction() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("missing").join("nested").join("x.db");
    let err = TransactionExecutor::sqlite_builder(path.to_string_lossy().into_owned())
        .connection_timeout(Duration::from_secs(2))
        .build()
        .await
        .expect_err("parent directory does not exist");
    assert!(matches!(err, SqlTxnError::ConfigError(_)));
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_options_fail_construction() {
    let err = TransactionExecutor::sqlite_builder("ok.db".into())
        .sequence_template("SELECT 1")
        .build()
        .await
        .expect_err("template without placeholder");
    assert!(matches!(err, SqlTxnError::ConfigError(_)));
}

#[tokio::test(flavor = "current_thread")]
async fn zero_checkout_timeout_is_a_config_error() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let registry = DataSourceRegistry::from_json(
        &serde_json::json!({
            "orders": {
                "db_path": dir.path().join("orders.db").to_string_lossy(),
                "connection_timeout_ms": 0
            }
        })
        .to_string(),
    )?;
    assert!(matches!(
        registry.resolve("orders"),
        Err(SqlTxnError::ConfigError(_))
    ));
    let err = TransactionExecutor::from_registry(&registry, "orders")
        .await
        .expect_err("zero timeout");
    assert!(matches!(err, SqlTxnError::ConfigError(_)));

    let err = TransactionExecutor::sqlite_builder(
        dir.path().join("direct.db").to_string_lossy().into_owned(),
    )
    .connection_timeout(Duration::ZERO)
    .build()
    .await
    .expect_err("zero timeout");
    assert!(matches!(err, SqlTxnError::ConfigError(_)));
    Ok(())
}
