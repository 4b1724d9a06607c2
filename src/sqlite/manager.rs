use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bb8::{ManageConnection, Pool, PooledConnection};
use tokio::sync::Mutex;

use crate::error::SqlTxnError;

use super::config::SqliteOptions;

/// A pooled `SQLite` connection, shared with the blocking worker that drives it.
pub type SharedSqliteConnection = Arc<Mutex<rusqlite::Connection>>;

pub type SqlitePool = Pool<SqliteManager>;
pub type SqlitePooledConnection = PooledConnection<'static, SqliteManager>;

/// bb8 manager for `rusqlite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    db_path: String,
    busy_timeout: Duration,
    wal: bool,
}

impl SqliteManager {
    #[must_use]
    pub fn new(opts: &SqliteOptions) -> Self {
        Self {
            db_path: opts.db_path.clone(),
            busy_timeout: opts.busy_timeout,
            wal: opts.wal,
        }
    }

    /// Build a pool from this manager.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ConfigError` if pool creation fails.
    pub async fn build_pool(self, opts: &SqliteOptions) -> Result<SqlitePool, SqlTxnError> {
        Pool::builder()
            .max_size(opts.max_size)
            .connection_timeout(opts.connection_timeout)
            .retry_connection(false)
            .test_on_check_out(false)
            .build(self)
            .await
            .map_err(|e| SqlTxnError::ConfigError(format!("sqlite pool error: {e}")))
    }

    fn open(&self) -> Result<rusqlite::Connection, SqlTxnError> {
        let conn = rusqlite::Connection::open(&self.db_path)?;
        conn.busy_timeout(self.busy_timeout)?;
        if self.wal && !is_memory_path(&self.db_path) {
            let mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            tracing::trace!(db_path = %self.db_path, journal_mode = %mode, "journal mode set");
        }
        Ok(conn)
    }
}

impl ManageConnection for SqliteManager {
    type Connection = SharedSqliteConnection;
    type Error = SqlTxnError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let manager = self.clone();
        async move {
            let conn = tokio::task::spawn_blocking(move || manager.open()).await??;
            Ok(Arc::new(Mutex::new(conn)))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        let handle = Arc::clone(conn);
        async move {
            run_blocking(handle, |guard| {
                guard
                    .query_row("SELECT 1", [], |_| Ok(()))
                    .map_err(SqlTxnError::SqliteError)
            })
            .await
        }
    }

    /// A connection still locked by a worker, or returned with an open
    /// transaction, is not handed out again.
    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        match conn.try_lock() {
            Ok(guard) => !guard.is_autocommit(),
            Err(_) => true,
        }
    }
}

fn is_memory_path(path: &str) -> bool {
    path == ":memory:" || path.contains("mode=memory") || path.starts_with("file::memory:")
}

/// Run synchronous `rusqlite` work for one pooled connection on the blocking pool.
///
/// # Errors
/// Returns whatever `func` returns, or `SqlTxnError::ExecutionError` if the
/// worker panicked or was cancelled.
pub(crate) async fn run_blocking<F, R>(
    conn: SharedSqliteConnection,
    func: F,
) -> Result<R, SqlTxnError>
where
    F: FnOnce(&mut rusqlite::Connection) -> Result<R, SqlTxnError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut guard = conn.blocking_lock();
        func(&mut guard)
    })
    .await?
}
