use crate::error::SqlTxnError;
use crate::operation::{SelectOperation, run_select};
use crate::results::ResultSet;
use crate::sequence::SequenceQuery;
use crate::statement::PreparedStatement;
use crate::types::RowValues;

/// Handle to the live connection for the duration of one executor call.
///
/// Inside [`TransactionExecutor::transaction`](crate::TransactionExecutor::transaction)
/// and [`execute_updates`](crate::TransactionExecutor::execute_updates) every statement
/// prepared here, including nested lookups such as [`next_sequence`](Self::next_sequence),
/// runs in the enclosing transaction and commits or rolls back with it.
#[derive(Clone, Copy)]
pub struct ScopedConnection<'c> {
    conn: &'c rusqlite::Connection,
    sequence_template: &'c str,
}

impl<'c> ScopedConnection<'c> {
    pub(crate) fn new(conn: &'c rusqlite::Connection, sequence_template: &'c str) -> Self {
        Self {
            conn,
            sequence_template,
        }
    }

    /// Prepare `sql` with no parameters bound yet.
    ///
    /// # Errors
    /// Returns `SqlTxnError::SqliteError` if `SQLite` rejects the statement.
    pub fn prepare(&self, sql: &str) -> Result<PreparedStatement<'c>, SqlTxnError> {
        let stmt = self.conn.prepare(sql)?;
        Ok(PreparedStatement::new(stmt))
    }

    /// Prepare `sql` and bind `params` in one step.
    ///
    /// # Errors
    /// Returns `SqlTxnError` if preparing or binding fails.
    pub fn prepare_with(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        self.prepare(sql)?.bind(params)
    }

    /// Run a nested DML statement on this connection.
    ///
    /// # Errors
    /// Returns `SqlTxnError` if preparing, binding or executing fails.
    pub fn execute(&self, sql: &str, params: &[RowValues]) -> Result<usize, SqlTxnError> {
        self.prepare_with(sql, params)?.execute()
    }

    /// Run a nested query on this connection and materialise its rows.
    ///
    /// # Errors
    /// Returns `SqlTxnError` if preparing, binding or reading rows fails.
    pub fn select(&self, sql: &str, params: &[RowValues]) -> Result<ResultSet, SqlTxnError> {
        let mut stmt = self.prepare_with(sql, params)?;
        let mut cursor = stmt.query()?;
        cursor.collect_result_set()
    }

    /// Run a nested query operation on this connection.
    ///
    /// # Errors
    /// Returns whatever creating the statement, executing it or decoding fails with.
    pub fn query<Q: SelectOperation>(&self, op: Q) -> Result<Q::Output, SqlTxnError> {
        run_select(*self, op)
    }

    /// Next value of sequence `name`, read on this connection.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ParameterError` for an invalid sequence name, or the
    /// query failure.
    pub fn next_sequence(&self, name: &str) -> Result<Option<i64>, SqlTxnError> {
        let op = SequenceQuery::new(name, self.sequence_template)?;
        self.query(op)
    }

    /// True while a transaction is open on this connection.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    /// The underlying `rusqlite` connection, for features not wrapped here.
    #[must_use]
    pub fn raw(&self) -> &'c rusqlite::Connection {
        self.conn
    }
}

impl std::fmt::Debug for ScopedConnection<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedConnection")
            .field("in_transaction", &self.in_transaction())
            .finish_non_exhaustive()
    }
}
