use std::sync::Arc;

use rusqlite::TransactionBehavior;

use crate::connection::ScopedConnection;
use crate::error::SqlTxnError;
use crate::operation::{
    CollectAll, SelectOperation, UpdateOperation, UpdateQuery, run_select, run_updates,
};
use crate::registry::DataSourceRegistry;
use crate::results::ResultSet;
use crate::sequence::{SequenceQuery, create_sequence_sql};
use crate::sqlite::config::{SqliteOptions, SqliteOptionsBuilder};
use crate::sqlite::manager::{SqliteManager, SqlitePool, SqlitePooledConnection, run_blocking};
use crate::types::RowValues;

/// Pool connection counts at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections currently open, checked out or idle.
    pub connections: u32,
    /// Connections idle in the pool.
    pub idle_connections: u32,
}

/// Runs caller operations on a pooled `SQLite` connection with
/// commit-on-success / rollback-on-failure semantics.
///
/// Each call checks out its own connection, drives it on one blocking worker
/// hop, and returns it to the pool on every exit path. Cloning is cheap and
/// shares the pool.
///
/// ```rust,no_run
/// use sql_txn::prelude::*;
///
/// # async fn demo() -> Result<(), SqlTxnError> {
/// let executor = TransactionExecutor::sqlite_builder("app.db".into()).build().await?;
/// executor
///     .execute_batch("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY, name TEXT)")
///     .await?;
///
/// let inserted = executor
///     .execute_updates(vec![
///         UpdateQuery::sql("INSERT INTO t (name) VALUES (?1)", vec!["alice".into()]),
///         UpdateQuery::sql("INSERT INTO t (name) VALUES (?1)", vec!["bob".into()]),
///     ])
///     .await?;
/// assert_eq!(inserted, 2);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct TransactionExecutor {
    pool: SqlitePool,
    sequence_template: Arc<str>,
}

impl std::fmt::Debug for TransactionExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionExecutor")
            .field("status", &self.state())
            .field("sequence_template", &self.sequence_template)
            .finish()
    }
}

impl TransactionExecutor {
    #[must_use]
    pub fn sqlite_builder(db_path: String) -> SqliteOptionsBuilder {
        SqliteOptionsBuilder::new(db_path)
    }

    /// Build the pool and check out one connection to prove it works.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ConfigError` if the options are invalid or the
    /// database cannot be opened. Construction is not retried.
    pub async fn new(opts: SqliteOptions) -> Result<Self, SqlTxnError> {
        opts.validate()?;
        let pool = SqliteManager::new(&opts).build_pool(&opts).await?;
        {
            let _smoke = pool.get().await.map_err(|e| {
                SqlTxnError::ConfigError(format!(
                    "cannot open SQLite database {}: {}",
                    opts.db_path,
                    SqlTxnError::from(e)
                ))
            })?;
        }
        tracing::debug!(db_path = %opts.db_path, max_size = opts.max_size, "sqlite pool ready");
        Ok(Self {
            pool,
            sequence_template: Arc::from(opts.sequence_template.as_str()),
        })
    }

    /// Resolve data source `name` in `registry`, then build as [`new`](Self::new).
    ///
    /// # Errors
    /// Returns `SqlTxnError::ResolutionError` if the name is unknown, or any
    /// error from [`new`](Self::new).
    pub async fn from_registry(
        registry: &DataSourceRegistry,
        name: &str,
    ) -> Result<Self, SqlTxnError> {
        let opts = registry.resolve(name)?;
        Self::new(opts).await
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    #[must_use]
    pub fn state(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    async fn checkout(&self) -> Result<SqlitePooledConnection, SqlTxnError> {
        Ok(self.pool.get_owned().await?)
    }

    /// Run `func` inside one transaction on a freshly checked-out connection.
    ///
    /// Commits when `func` returns `Ok`. On any error, including a failed commit,
    /// rolls back and returns [`SqlTxnError::TransactionFailed`] wrapping the
    /// original cause; a rollback failure is attached to it, never substituted.
    /// The connection goes back to the pool in every case.
    ///
    /// # Errors
    /// Returns a checkout or `BEGIN` failure unwrapped, otherwise `TransactionFailed`.
    pub async fn transaction<F, T>(&self, func: F) -> Result<T, SqlTxnError>
    where
        F: FnOnce(ScopedConnection<'_>) -> Result<T, SqlTxnError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.checkout().await?;
        let template = Arc::clone(&self.sequence_template);
        let outcome = run_blocking(Arc::clone(&*conn), move |raw| {
            run_in_transaction(raw, &template, func)
        })
        .await;
        drop(conn);
        outcome
    }

    /// Run every operation, in order, in one transaction and return the total
    /// number of affected rows.
    ///
    /// Each statement is finalized right after it executes. If any statement
    /// fails to build or execute, nothing is committed.
    ///
    /// # Errors
    /// Returns [`SqlTxnError::TransactionFailed`] wrapping the first failure, or
    /// a checkout error.
    pub async fn execute_updates<I>(&self, ops: I) -> Result<u64, SqlTxnError>
    where
        I: IntoIterator,
        I::Item: UpdateOperation + 'static,
    {
        let ops: Vec<I::Item> = ops.into_iter().collect();
        let count = ops.len();
        let affected = self
            .transaction(move |conn| run_updates(conn, &ops))
            .await?;
        tracing::debug!(operations = count, affected, "update batch committed");
        Ok(affected)
    }

    /// Single DML statement in its own transaction.
    ///
    /// # Errors
    /// See [`execute_updates`](Self::execute_updates).
    pub async fn update(&self, sql: &str, params: &[RowValues]) -> Result<u64, SqlTxnError> {
        self.execute_updates([UpdateQuery::sql(sql, params.to_vec())])
            .await
    }

    /// Create the statement, execute it as a query, and decode its rows.
    ///
    /// No transaction is opened. The cursor, then the statement, then the
    /// connection are released whether decoding succeeds or not.
    ///
    /// # Errors
    /// Returns the checkout, statement, execution or decode error unchanged.
    pub async fn query<Q>(&self, op: Q) -> Result<Q::Output, SqlTxnError>
    where
        Q: SelectOperation + 'static,
        Q::Output: Send + 'static,
    {
        let conn = self.checkout().await?;
        let template = Arc::clone(&self.sequence_template);
        let outcome = run_blocking(Arc::clone(&*conn), move |raw| {
            run_select(ScopedConnection::new(raw, &template), op)
        })
        .await;
        drop(conn);
        outcome
    }

    /// Run a query and materialise every row.
    ///
    /// # Errors
    /// See [`query`](Self::query).
    pub async fn select_all(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<ResultSet, SqlTxnError> {
        self.query(CollectAll {
            sql: sql.to_owned(),
            params: params.to_vec(),
        })
        .await
    }

    /// Next value of sequence `name`, or `None` if the sequence query returns
    /// no row.
    ///
    /// The name is spliced into the configured sequence template, so it must be a
    /// plain identifier; anything else is rejected before a connection is taken.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ParameterError` for an invalid name, or the query error.
    pub async fn next_sequence(&self, name: &str) -> Result<Option<i64>, SqlTxnError> {
        let op = SequenceQuery::new(name, &self.sequence_template)?;
        self.query(op).await
    }

    /// Create (if missing) a counter table for sequence `name` in the default
    /// layout, seeded so the next value handed out is `start`.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ParameterError` for an invalid name, or
    /// `TransactionFailed` if the DDL fails.
    pub async fn create_sequence(&self, name: &str, start: i64) -> Result<(), SqlTxnError> {
        let (create, seed) = create_sequence_sql(name)?;
        let last = start.checked_sub(1).ok_or_else(|| {
            SqlTxnError::ParameterError(format!("sequence start {start} is out of range"))
        })?;
        self.transaction(move |conn| {
            conn.execute(&create, &[])?;
            conn.execute(&seed, &[RowValues::Int(last)])?;
            Ok(())
        })
        .await
    }

    /// Run a multi-statement script (schema setup, seed data) in one transaction.
    ///
    /// # Errors
    /// Returns `TransactionFailed` if any statement in the script fails.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), SqlTxnError> {
        let sql = sql.to_owned();
        self.transaction(move |conn| Ok(conn.raw().execute_batch(&sql)?))
            .await
    }
}

fn run_in_transaction<F, T>(
    raw: &mut rusqlite::Connection,
    sequence_template: &str,
    func: F,
) -> Result<T, SqlTxnError>
where
    F: FnOnce(ScopedConnection<'_>) -> Result<T, SqlTxnError>,
{
    let tx = raw.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let result = func(ScopedConnection::new(&tx, sequence_template));
    match result {
        Ok(value) => match tx.commit() {
            Ok(()) => {
                tracing::trace!("transaction committed");
                Ok(value)
            }
            // A failed COMMIT leaves the transaction open; dropping `tx` rolls it back.
            Err(e) => Err(SqlTxnError::transaction_failed(e.into(), None)),
        },
        Err(cause) => {
            let rollback_error = tx.rollback().err().map(|e| {
                tracing::warn!(error = %e, cause = %cause, "rollback failed after transaction error");
                SqlTxnError::SqliteError(e)
            });
            tracing::debug!(error = %cause, "transaction rolled back");
            Err(SqlTxnError::transaction_failed(cause, rollback_error))
        }
    }
}
