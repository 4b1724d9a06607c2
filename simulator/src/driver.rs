use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sql_txn::prelude::*;

use crate::args::SimConfig;
use crate::logging::EventLog;
use crate::model::{AccountOp, Expected, TaskModel};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    owner INTEGER NOT NULL,
    balance INTEGER NOT NULL
);
DELETE FROM accounts;";

const BATCH_SEQUENCE: &str = "sim_batch_seq";

fn to_update(op: &AccountOp, owner: i64) -> UpdateQuery {
    match *op {
        AccountOp::Open { id } => UpdateQuery::sql(
            "INSERT INTO accounts (id, owner, balance) VALUES (?1, ?2, 0) ON CONFLICT (id) DO NOTHING",
            vec![RowValues::Int(id), RowValues::Int(owner)],
        ),
        AccountOp::Deposit { id, amount } => UpdateQuery::sql(
            "UPDATE accounts SET balance = balance + ?1 WHERE id = ?2",
            vec![RowValues::Int(amount), RowValues::Int(id)],
        ),
        AccountOp::Close { id } => UpdateQuery::sql(
            "DELETE FROM accounts WHERE id = ?1",
            vec![RowValues::Int(id)],
        ),
        AccountOp::Fail { id } => UpdateQuery::sql(
            "INSERT INTO accounts (id, owner, balance) VALUES (?1, ?2, NULL)",
            vec![RowValues::Int(id), RowValues::Int(owner)],
        ),
        AccountOp::Panic => UpdateQuery::new(|_conn| panic!("injected panic in statement factory")),
    }
}

struct TaskOutcome {
    task: usize,
    batch_id: Option<i64>,
    result: Result<u64, SqlTxnError>,
}

async fn open_executor(
    config: &SimConfig,
) -> Result<(Option<tempfile::TempDir>, TransactionExecutor), String> {
    let (dir, path) = match &config.db {
        Some(path) => (None, path.clone()),
        None => {
            let dir = tempfile::tempdir().map_err(|e| format!("tempdir: {e}"))?;
            let path = dir.path().join("simulator.db");
            (Some(dir), path)
        }
    };
    let executor = TransactionExecutor::sqlite_builder(path.to_string_lossy().into_owned())
        .max_size(config.pool_size)
        .build()
        .await
        .map_err(|e| format!("executor: {e}"))?;
    Ok((dir, executor))
}

pub(crate) async fn run(config: SimConfig, rng: &mut ChaCha8Rng) -> Result<(), String> {
    let (_dir, executor) = open_executor(&config).await?;
    executor
        .execute_batch(SCHEMA)
        .await
        .map_err(|e| format!("schema: {e}"))?;
    executor
        .create_sequence(BATCH_SEQUENCE, 1)
        .await
        .map_err(|e| format!("sequence: {e}"))?;

    let mut models: Vec<TaskModel> = (0..config.tasks).map(TaskModel::new).collect();
    let mut task_rngs: Vec<ChaCha8Rng> = (0..config.tasks)
        .map(|_| ChaCha8Rng::seed_from_u64(rng.random()))
        .collect();
    let mut events = EventLog::new(20, 60);
    let mut batch_ids = HashSet::new();
    let mut committed = 0u64;
    let mut rolled_back = 0u64;

    let started = Instant::now();
    let max_rounds = config.rounds.unwrap_or(u64::MAX);
    let max_time = config.duration_ms.unwrap_or(u64::MAX);

    let mut round: u64 = 0;
    while round < max_rounds && elapsed_ms(started) <= max_time {
        let mut expectations = Vec::with_capacity(config.tasks);
        let mut handles = Vec::with_capacity(config.tasks);
        for (model, task_rng) in models.iter().zip(task_rngs.iter_mut()) {
            let ops = model.plan(task_rng, config.max_batch, config.fail_rate, config.panic_rate);
            expectations.push(model.expect(&ops));
            let owner = i64::try_from(model.task).map_err(|e| e.to_string())?;
            let task = model.task;
            let executor = executor.clone();
            handles.push(tokio::spawn(async move {
                let batch_id = match executor.next_sequence(BATCH_SEQUENCE).await {
                    Ok(id) => id,
                    Err(err) => {
                        return TaskOutcome {
                            task,
                            batch_id: None,
                            result: Err(err),
                        };
                    }
                };
                let updates: Vec<UpdateQuery> = ops.iter().map(|op| to_update(op, owner)).collect();
                let result = executor.execute_updates(updates).await;
                TaskOutcome {
                    task,
                    batch_id,
                    result,
                }
            }));
        }

        for handle in handles {
            let outcome = handle.await.map_err(|e| format!("task join: {e}"))?;
            let (expected, next) = &expectations[outcome.task];
            let label = match &outcome.result {
                Ok(n) => format!("Ok({n})"),
                Err(err) => format!("Err({err})"),
            };
            events.record(format!(
                "round={} task={} batch={:?} expected={:?} result={}",
                round, outcome.task, outcome.batch_id, expected, label
            ));

            let batch_id = match outcome.batch_id {
                Some(id) => id,
                None => {
                    let reason = format!("task {} got no batch id", outcome.task);
                    events.dump_failure(&reason);
                    return Err(reason);
                }
            };
            if !batch_ids.insert(batch_id) {
                let reason = format!("batch id {batch_id} handed out twice");
                events.dump_failure(&reason);
                return Err(reason);
            }

            match (expected, &outcome.result) {
                (Expected::Committed(want), Ok(got)) if want == got => {
                    models[outcome.task].balances = next.clone();
                    committed += 1;
                }
                (Expected::RolledBack, Err(_)) => rolled_back += 1,
                _ => {
                    let reason = format!(
                        "task {} expected {:?}, executor returned {}",
                        outcome.task, expected, label
                    );
                    events.dump_failure(&reason);
                    return Err(reason);
                }
            }
        }

        if let Err(reason) = check_round(&executor, &models).await {
            events.dump_failure(&reason);
            return Err(reason);
        }
        round += 1;
    }

    tracing::info!(
        "complete: rounds={} committed={} rolled_back={} time={}ms tasks={} pool_size={}",
        round,
        committed,
        rolled_back,
        elapsed_ms(started),
        config.tasks,
        config.pool_size
    );
    Ok(())
}

/// Table contents match the union of task models and no connection is left
/// checked out.
async fn check_round(executor: &TransactionExecutor, models: &[TaskModel]) -> Result<(), String> {
    let status = executor.state();
    if status.connections != status.idle_connections {
        return Err(format!("connections still checked out after round: {status:?}"));
    }

    let rows = executor
        .select_all("SELECT id, balance FROM accounts ORDER BY id", &[])
        .await
        .map_err(|e| format!("snapshot: {e}"))?;
    let mut actual = BTreeMap::new();
    for row in &rows {
        let id = row.get("id").and_then(RowValues::as_int).copied();
        let balance = row.get("balance").and_then(RowValues::as_int).copied();
        match (id, balance) {
            (Some(id), Some(balance)) => {
                actual.insert(id, balance);
            }
            _ => return Err(format!("unexpected row shape: {:?}", row.rows)),
        }
    }

    let expected: BTreeMap<i64, i64> = models
        .iter()
        .flat_map(|model| model.balances.iter().map(|(k, v)| (*k, *v)))
        .collect();
    if actual != expected {
        return Err(format!(
            "table diverged from model: expected {} accounts, found {}",
            expected.len(),
            actual.len()
        ));
    }
    Ok(())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
