mod common;

use chrono::NaiveDate;
use serde_json::json;

use common::{assert_all_released, file_executor};
use sql_txn::prelude::*;

async fn seed_people(executor: &TransactionExecutor) -> Result<(), SqlTxnError> {
    executor
        .execute_batch(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL);
             INSERT INTO people (id, name, score) VALUES (1, 'ada', 9.5);
             INSERT INTO people (id, name, score) VALUES (2, 'grace', 8.0);
             INSERT INTO people (id, name, score) VALUES (3, 'linus', NULL);",
        )
        .await
}

#[tokio::test(flavor = "current_thread")]
async fn decode_sees_exactly_the_statement_rows() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, executor) = file_executor(1).await?;
    seed_people(&executor).await?;

    let people = executor
        .query(SelectQuery::new(
            |conn| {
                conn.prepare("SELECT id, name FROM people WHERE id >= ?1 ORDER BY id")?
                    .bind(&[RowValues::Int(2)])
            },
            |rows| {
                assert_eq!(rows.column_names(), ["id", "name"]);
                let mut out = Vec::new();
                while let Some(row) = rows.next_row()? {
                    out.push((row.get::<i64>(0)?, row.get_by_name::<String>("name")?));
                }
                Ok(out)
            },
        ))
        .await?;

    assert_eq!(
        people,
        vec![(2, "grace".to_string()), (3, "linus".to_string())]
    );
    assert_all_released(&executor);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn no_rows_decodes_to_none() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, executor) = file_executor(1).await?;
    seed_people(&executor).await?;

    let found = executor
        .query(SelectQuery::new(
            |conn| conn.prepare_with("SELECT name FROM people WHERE id = ?1", &[RowValues::Int(42)]),
            |rows| match rows.next_row()? {
                Some(row) => Ok(Some(row.get::<String>(0)?)),
                None => Ok(None),
            },
        ))
        .await?;
    assert_eq!(found, None);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn decode_failure_propagates_and_releases() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, executor) = file_executor(1).await?;
    seed_people(&executor).await?;

    let err = executor
        .query(SelectQuery::new(
            |conn| conn.prepare("SELECT name FROM people ORDER BY id"),
            |rows| -> Result<(), SqlTxnError> {
                let _first = rows.next_row()?;
                Err(SqlTxnError::DecodeError("unexpected shape".into()))
            },
        ))
        .await
        .expect_err("decoder error is returned");
    // The query form does not wrap errors.
    assert!(matches!(err, SqlTxnError::DecodeError(msg) if msg == "unexpected shape"));

    // Type mismatches inside the decoder surface the same way.
    let err = executor
        .query(SelectQuery::new(
            |conn| conn.prepare("SELECT name FROM people"),
            |rows| match rows.next_row()? {
                Some(row) => row.get::<i64>(0),
                None => Ok(0),
            },
        ))
        .await
        .expect_err("text is not an integer");
    assert!(matches!(err, SqlTxnError::SqliteError(_)));

    // The single pooled connection came back both times.
    let rs = executor.select_all("SELECT COUNT(*) AS n FROM people", &[]).await?;
    assert_eq!(rs.results[0].get("n"), Some(&RowValues::Int(3)));
    assert_all_released(&executor);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn statement_failure_is_not_wrapped() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, executor) = file_executor(1).await?;
    let err = executor
        .select_all("SELECT * FROM missing_table", &[])
        .await
        .expect_err("missing table");
    assert!(matches!(err, SqlTxnError::SqliteError(_)));
    assert!(err.rollback_error().is_none());
    assert_all_released(&executor);
    Ok(())
}

#[tokio::test(flavor = "current_thread")]
async fn select_all_converts_values() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, executor) = file_executor(2).await?;
    executor
        .execute_batch(
            "CREATE TABLE samples (
                id INTEGER PRIMARY KEY,
                label TEXT,
                ratio REAL,
                flag BOOLEAN,
                seen_at TEXT,
                payload TEXT,
                raw BLOB
            );",
        )
        .await?;

    let seen_at = NaiveDate::from_ymd_opt(2024, 5, 17)
        .and_then(|d| d.and_hms_opt(8, 15, 0))
        .ok_or("invalid date")?;
    executor
        .update(
            "INSERT INTO samples (id, label, ratio, flag, seen_at, payload, raw)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            &[
                RowValues::Int(1),
                RowValues::Null,
                RowValues::Float(0.25),
                RowValues::Bool(true),
                RowValues::Timestamp(seen_at),
                RowValues::JSON(json!({"k": [1, 2]})),
                RowValues::Blob(vec![0xde, 0xad]),
            ],
        )
        .await?;

    let rs = executor
        .select_all("SELECT * FROM samples WHERE id = ?1", &[RowValues::Int(1)])
        .await?;
    assert_eq!(rs.len(), 1);
    assert_eq!(
        rs.column_names(),
        ["id", "label", "ratio", "flag", "seen_at", "payload", "raw"]
    );
    let row = rs.first().ok_or("one row")?;
    assert!(row.get("label").is_some_and(RowValues::is_null));
    assert_eq!(row.get("ratio").and_then(RowValues::as_float), Some(0.25));
    assert_eq!(row.get("flag").and_then(RowValues::as_bool), Some(true));
    assert_eq!(row.get("seen_at").and_then(RowValues::as_timestamp), Some(seen_at));
    let payload: serde_json::Value =
        serde_json::from_str(row.get("payload").and_then(RowValues::as_text).ok_or("text")?)?;
    assert_eq!(payload, json!({"k": [1, 2]}));
    assert_eq!(
        row.get_by_index(6).and_then(RowValues::as_blob),
        Some(&[0xde, 0xad][..])
    );
    Ok(())
}
