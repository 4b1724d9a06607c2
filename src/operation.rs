//! Caller-supplied units of work.
//!
//! An [`UpdateOperation`] builds one DML statement; a [`SelectOperation`] builds
//! a query and decodes its rows. Implement the traits on your own types, or
//! wrap closures with [`UpdateQuery`] and [`SelectQuery`].

use crate::connection::ScopedConnection;
use crate::error::SqlTxnError;
use crate::statement::{PreparedStatement, RowCursor};
use crate::types::RowValues;

/// Builds a DML statement on the connection it is handed.
///
/// The executor runs the statement and finalizes it; the operation owns no
/// database resources.
pub trait UpdateOperation: Send {
    /// # Errors
    /// Any error aborts the enclosing transaction.
    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError>;
}

/// Builds a query and decodes the rows it yields.
pub trait SelectOperation: Send {
    type Output;

    /// # Errors
    /// Returned to the caller unchanged.
    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError>;

    /// Decode the cursor into the output value.
    ///
    /// The cursor is closed when this returns; copy out anything you need.
    ///
    /// # Errors
    /// Returned to the caller unchanged.
    fn decode(self, rows: &mut RowCursor<'_>) -> Result<Self::Output, SqlTxnError>;
}

impl<T: UpdateOperation + ?Sized> UpdateOperation for Box<T> {
    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        (**self).create_statement(conn)
    }
}

type CreateFn = dyn for<'c> Fn(ScopedConnection<'c>) -> Result<PreparedStatement<'c>, SqlTxnError>
    + Send;

/// Closure-backed [`UpdateOperation`].
///
/// ```rust
/// use sql_txn::prelude::*;
///
/// let op = UpdateQuery::new(|conn| {
///     conn.prepare("UPDATE accounts SET balance = balance - ?1 WHERE id = ?2")?
///         .bind(&[RowValues::Int(25), RowValues::Int(7)])
/// });
/// let fixed = UpdateQuery::sql("DELETE FROM sessions WHERE expired = 1", vec![]);
/// # let _ = (op, fixed);
/// ```
pub struct UpdateQuery {
    create: Box<CreateFn>,
}

impl UpdateQuery {
    pub fn new<F>(create: F) -> Self
    where
        F: for<'c> Fn(ScopedConnection<'c>) -> Result<PreparedStatement<'c>, SqlTxnError>
            + Send
            + 'static,
    {
        Self {
            create: Box::new(create),
        }
    }

    /// A fixed statement with fixed parameters.
    pub fn sql(sql: impl Into<String>, params: Vec<RowValues>) -> Self {
        let sql = sql.into();
        Self::new(move |conn| conn.prepare_with(&sql, &params))
    }
}

impl UpdateOperation for UpdateQuery {
    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        (self.create)(conn)
    }
}

impl std::fmt::Debug for UpdateQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateQuery").finish_non_exhaustive()
    }
}

/// Closure-backed [`SelectOperation`]: one closure builds the statement, the
/// other decodes its rows.
///
/// ```rust
/// use sql_txn::prelude::*;
///
/// let count = SelectQuery::new(
///     |conn| conn.prepare("SELECT COUNT(*) FROM accounts"),
///     |rows| match rows.next_row()? {
///         Some(row) => row.get::<i64>(0),
///         None => Ok(0),
///     },
/// );
/// # let _ = count;
/// ```
pub struct SelectQuery<C, D> {
    create: C,
    decode: D,
}

impl<C, D> SelectQuery<C, D> {
    pub fn new<T>(create: C, decode: D) -> Self
    where
        C: for<'c> Fn(ScopedConnection<'c>) -> Result<PreparedStatement<'c>, SqlTxnError> + Send,
        D: FnOnce(&mut RowCursor<'_>) -> Result<T, SqlTxnError> + Send,
    {
        Self { create, decode }
    }
}

impl<C, D, T> SelectOperation for SelectQuery<C, D>
where
    C: for<'c> Fn(ScopedConnection<'c>) -> Result<PreparedStatement<'c>, SqlTxnError> + Send,
    D: FnOnce(&mut RowCursor<'_>) -> Result<T, SqlTxnError> + Send,
{
    type Output = T;

    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        (self.create)(conn)
    }

    fn decode(self, rows: &mut RowCursor<'_>) -> Result<T, SqlTxnError> {
        (self.decode)(rows)
    }
}

/// Decoder that materialises every row; used by `select_all`.
pub(crate) struct CollectAll {
    pub(crate) sql: String,
    pub(crate) params: Vec<RowValues>,
}

impl SelectOperation for CollectAll {
    type Output = crate::results::ResultSet;

    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        conn.prepare_with(&self.sql, &self.params)
    }

    fn decode(self, rows: &mut RowCursor<'_>) -> Result<Self::Output, SqlTxnError> {
        rows.collect_result_set()
    }
}

/// Create, execute, decode; the cursor is dropped before the statement.
pub(crate) fn run_select<Q: SelectOperation>(
    conn: ScopedConnection<'_>,
    op: Q,
) -> Result<Q::Output, SqlTxnError> {
    let mut stmt = op.create_statement(conn)?;
    let mut cursor = stmt.query()?;
    let decoded = op.decode(&mut cursor);
    drop(cursor);
    drop(stmt);
    decoded
}

/// Run update operations in order on `conn`, finalizing each statement right
/// after it executes. Returns the summed affected-row count.
pub(crate) fn run_updates<U: UpdateOperation>(
    conn: ScopedConnection<'_>,
    ops: &[U],
) -> Result<u64, SqlTxnError> {
    let mut affected: u64 = 0;
    for (idx, op) in ops.iter().enumerate() {
        let stmt = op.create_statement(conn)?;
        let rows = stmt.execute()?;
        tracing::trace!(operation = idx, rows, "update operation executed");
        affected += rows as u64;
    }
    Ok(affected)
}
