use std::time::Duration;

use crate::error::SqlTxnError;
use crate::executor::TransactionExecutor;
use crate::sequence::{DEFAULT_SEQUENCE_TEMPLATE, SEQUENCE_NAME_PLACEHOLDER};

pub const DEFAULT_MAX_SIZE: u32 = 10;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for configuring a `SQLite` pool.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    /// Upper bound on pooled connections.
    pub max_size: u32,
    /// How long a checkout waits for a free connection.
    pub connection_timeout: Duration,
    /// `SQLite` busy handler timeout applied to every connection.
    pub busy_timeout: Duration,
    /// Switch file databases to WAL journaling on connect.
    pub wal: bool,
    /// Query issued by the sequence helper; `{name}` is replaced by the sequence name.
    pub sequence_template: String,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            max_size: DEFAULT_MAX_SIZE,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            wal: true,
            sequence_template: DEFAULT_SEQUENCE_TEMPLATE.to_string(),
        }
    }

    /// Reject option combinations the pool cannot be built from.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<(), SqlTxnError> {
        if self.db_path.trim().is_empty() {
            return Err(SqlTxnError::ConfigError("db_path must not be empty".into()));
        }
        if self.max_size == 0 {
            return Err(SqlTxnError::ConfigError(
                "max_size must be at least 1".into(),
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(SqlTxnError::ConfigError(
                "connection_timeout must be non-zero".into(),
            ));
        }
        if !self.sequence_template.contains(SEQUENCE_NAME_PLACEHOLDER) {
            return Err(SqlTxnError::ConfigError(format!(
                "sequence_template must contain {SEQUENCE_NAME_PLACEHOLDER}"
            )));
        }
        Ok(())
    }
}

/// Fluent builder for `SQLite` options.
#[derive(Debug, Clone)]
pub struct SqliteOptionsBuilder {
    opts: SqliteOptions,
}

impl SqliteOptionsBuilder {
    #[must_use]
    pub fn new(db_path: String) -> Self {
        Self {
            opts: SqliteOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.opts.max_size = max_size;
        self
    }

    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.opts.connection_timeout = timeout;
        self
    }

    #[must_use]
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.opts.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn wal(mut self, wal: bool) -> Self {
        self.opts.wal = wal;
        self
    }

    #[must_use]
    pub fn sequence_template(mut self, template: impl Into<String>) -> Self {
        self.opts.sequence_template = template.into();
        self
    }

    #[must_use]
    pub fn finish(self) -> SqliteOptions {
        self.opts
    }

    /// Build a `TransactionExecutor` for these options.
    ///
    /// # Errors
    ///
    /// Returns `SqlTxnError` if the options are invalid, or pool creation or the
    /// initial smoke test fails.
    pub async fn build(self) -> Result<TransactionExecutor, SqlTxnError> {
        TransactionExecutor::new(self.finish()).await
    }
}
