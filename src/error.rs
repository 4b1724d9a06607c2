use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlTxnError {
    #[error(transparent)]
    SqliteError(#[from] rusqlite::Error),

    #[error("Data source resolution error: {0}")]
    ResolutionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Parameter error: {0}")]
    ParameterError(String),

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    /// A transactional call failed and was rolled back.
    ///
    /// `source` is the failure that aborted the transaction. When the rollback
    /// itself also failed, that error is kept in `rollback_error`; it never
    /// replaces the original cause.
    #[error("Transaction failed: {source}")]
    TransactionFailed {
        #[source]
        source: Box<SqlTxnError>,
        rollback_error: Option<Box<SqlTxnError>>,
    },
}

impl SqlTxnError {
    /// Wrap `source` as the cause of an aborted transaction.
    #[must_use]
    pub fn transaction_failed(source: SqlTxnError, rollback_error: Option<SqlTxnError>) -> Self {
        SqlTxnError::TransactionFailed {
            source: Box::new(source),
            rollback_error: rollback_error.map(Box::new),
        }
    }

    /// The error that caused a transaction to abort, or `self` for any other variant.
    #[must_use]
    pub fn root_cause(&self) -> &SqlTxnError {
        match self {
            SqlTxnError::TransactionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The rollback failure recorded alongside a failed transaction, if any.
    #[must_use]
    pub fn rollback_error(&self) -> Option<&SqlTxnError> {
        match self {
            SqlTxnError::TransactionFailed { rollback_error, .. } => rollback_error.as_deref(),
            _ => None,
        }
    }
}

impl From<bb8::RunError<SqlTxnError>> for SqlTxnError {
    fn from(err: bb8::RunError<SqlTxnError>) -> Self {
        match err {
            bb8::RunError::User(inner) => {
                SqlTxnError::ConnectionError(format!("SQLite pool checkout failed: {inner}"))
            }
            bb8::RunError::TimedOut => {
                SqlTxnError::ConnectionError("SQLite pool checkout timed out".into())
            }
        }
    }
}

impl From<tokio::task::JoinError> for SqlTxnError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            SqlTxnError::ExecutionError(format!("sqlite worker panicked: {err}"))
        } else {
            SqlTxnError::ExecutionError(format!("sqlite spawn_blocking join error: {err}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_cause_unwraps_nested_failures() {
        let inner = SqlTxnError::ParameterError("bad".into());
        let wrapped = SqlTxnError::transaction_failed(
            SqlTxnError::transaction_failed(inner, None),
            Some(SqlTxnError::ExecutionError("rollback".into())),
        );
        assert!(matches!(
            wrapped.root_cause(),
            SqlTxnError::ParameterError(msg) if msg == "bad"
        ));
        assert!(matches!(
            wrapped.rollback_error(),
            Some(SqlTxnError::ExecutionError(_))
        ));
    }

    #[test]
    fn display_keeps_original_message() {
        let err = SqlTxnError::transaction_failed(SqlTxnError::DecodeError("x".into()), None);
        assert_eq!(err.to_string(), "Transaction failed: Decode error: x");
        assert!(err.rollback_error().is_none());
    }
}
