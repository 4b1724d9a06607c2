use std::sync::Arc;

use rusqlite::types::FromSql;

use crate::error::SqlTxnError;
use crate::results::ResultSet;
use crate::sqlite::params::Params;
use crate::sqlite::query::sqlite_extract_value;
use crate::types::RowValues;

/// A statement prepared on a scoped connection, with its bound parameters.
///
/// The statement borrows the connection it was prepared on, so it cannot
/// outlive the executor call. It is finalized as soon as it is dropped.
pub struct PreparedStatement<'c> {
    stmt: rusqlite::Statement<'c>,
    params: Params,
}

impl<'c> PreparedStatement<'c> {
    pub(crate) fn new(stmt: rusqlite::Statement<'c>) -> Self {
        Self {
            stmt,
            params: Params::default(),
        }
    }

    /// Bind positional parameters, replacing any bound earlier.
    ///
    /// # Errors
    /// Returns `SqlTxnError::ParameterError` if the number of values does not
    /// match the placeholders in the statement.
    pub fn bind(mut self, params: &[RowValues]) -> Result<Self, SqlTxnError> {
        let expected = self.stmt.parameter_count();
        if params.len() != expected {
            return Err(SqlTxnError::ParameterError(format!(
                "statement expects {expected} parameters, got {}",
                params.len()
            )));
        }
        self.params = Params::convert(params);
        Ok(self)
    }

    /// Number of placeholders in the statement text.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.stmt.parameter_count()
    }

    /// Execute as DML and return the affected row count. Consumes the statement.
    pub(crate) fn execute(mut self) -> Result<usize, SqlTxnError> {
        let affected = self
            .stmt
            .execute(rusqlite::params_from_iter(self.params.as_values()))?;
        Ok(affected)
    }

    /// Execute as a query; the cursor borrows the statement.
    pub(crate) fn query(&mut self) -> Result<RowCursor<'_>, SqlTxnError> {
        let column_names: Vec<String> = self
            .stmt
            .column_names()
            .into_iter()
            .map(str::to_owned)
            .collect();
        let rows = self
            .stmt
            .query(rusqlite::params_from_iter(self.params.as_values()))?;
        Ok(RowCursor {
            rows,
            column_names: Arc::new(column_names),
        })
    }
}

/// Forward-only cursor over the rows of one executing query.
///
/// Only reachable from inside a decode step; rows must be read or copied out
/// before the step returns.
pub struct RowCursor<'s> {
    rows: rusqlite::Rows<'s>,
    column_names: Arc<Vec<String>>,
}

impl<'s> RowCursor<'s> {
    /// Advance to the next row, or `None` once the result is exhausted.
    ///
    /// # Errors
    /// Returns `SqlTxnError::SqliteError` if stepping the statement fails.
    pub fn next_row(&mut self) -> Result<Option<CursorRow<'_, 's>>, SqlTxnError> {
        let columns = &self.column_names;
        Ok(self.rows.next()?.map(|row| CursorRow { row, columns }))
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Read every remaining row into an owned `ResultSet`.
    ///
    /// # Errors
    /// Returns `SqlTxnError` if stepping or value extraction fails.
    pub fn collect_result_set(&mut self) -> Result<ResultSet, SqlTxnError> {
        let mut result_set = ResultSet::with_columns(Arc::clone(&self.column_names));
        while let Some(row) = self.next_row()? {
            result_set.add_row_values(row.values()?);
        }
        Ok(result_set)
    }
}

/// One row under the cursor.
pub struct CursorRow<'a, 's> {
    row: &'a rusqlite::Row<'s>,
    columns: &'a Arc<Vec<String>>,
}

impl CursorRow<'_, '_> {
    /// Read column `idx` as any `rusqlite` `FromSql` type.
    ///
    /// # Errors
    /// Returns `SqlTxnError::SqliteError` on an out-of-range index or a type mismatch.
    pub fn get<T: FromSql>(&self, idx: usize) -> Result<T, SqlTxnError> {
        Ok(self.row.get(idx)?)
    }

    /// Read a column by name.
    ///
    /// # Errors
    /// Returns `SqlTxnError::DecodeError` if no column has that name.
    pub fn get_by_name<T: FromSql>(&self, name: &str) -> Result<T, SqlTxnError> {
        let idx = self
            .columns
            .iter()
            .position(|col| col == name)
            .ok_or_else(|| SqlTxnError::DecodeError(format!("no column named {name}")))?;
        self.get(idx)
    }

    /// Column `idx` as a backend-neutral value.
    ///
    /// # Errors
    /// Returns `SqlTxnError` on an out-of-range index or non UTF-8 text.
    pub fn value(&self, idx: usize) -> Result<RowValues, SqlTxnError> {
        sqlite_extract_value(self.row, idx)
    }

    /// All columns as backend-neutral values.
    ///
    /// # Errors
    /// Returns `SqlTxnError` if any column fails to convert.
    pub fn values(&self) -> Result<Vec<RowValues>, SqlTxnError> {
        (0..self.columns.len()).map(|idx| self.value(idx)).collect()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}
