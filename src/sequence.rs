use std::sync::LazyLock;

use regex::Regex;

use crate::connection::ScopedConnection;
use crate::error::SqlTxnError;
use crate::operation::SelectOperation;
use crate::statement::{PreparedStatement, RowCursor};

pub const SEQUENCE_NAME_PLACEHOLDER: &str = "{name}";

/// `SQLite` has no native sequences; the default layout is a one-row counter
/// table whose `value` column holds the last value handed out.
pub const DEFAULT_SEQUENCE_TEMPLATE: &str = "UPDATE {name} SET value = value + 1 RETURNING value";

static SEQUENCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("sequence name pattern compiles")
});

/// Sequence names are spliced into SQL text, so only plain (optionally
/// schema-qualified) identifiers are accepted.
///
/// # Errors
/// Returns `SqlTxnError::ParameterError` for anything else.
pub fn validate_sequence_name(name: &str) -> Result<(), SqlTxnError> {
    if SEQUENCE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(SqlTxnError::ParameterError(format!(
            "invalid sequence name: {name:?}"
        )))
    }
}

/// Query operation returning the next value of a named sequence, or `None`
/// when the sequence query yields no row.
#[derive(Debug, Clone)]
pub struct SequenceQuery {
    sql: String,
}

impl SequenceQuery {
    /// # Errors
    /// Returns `SqlTxnError::ParameterError` if `name` is not a plain identifier.
    pub fn new(name: &str, template: &str) -> Result<Self, SqlTxnError> {
        validate_sequence_name(name)?;
        Ok(Self {
            sql: template.replace(SEQUENCE_NAME_PLACEHOLDER, name),
        })
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl SelectOperation for SequenceQuery {
    type Output = Option<i64>;

    fn create_statement<'c>(
        &self,
        conn: ScopedConnection<'c>,
    ) -> Result<PreparedStatement<'c>, SqlTxnError> {
        conn.prepare(&self.sql)
    }

    fn decode(self, rows: &mut RowCursor<'_>) -> Result<Option<i64>, SqlTxnError> {
        match rows.next_row()? {
            Some(row) => Ok(Some(row.get::<i64>(0)?)),
            None => Ok(None),
        }
    }
}

/// Statements creating and seeding a counter table in the default layout, so
/// that the first `next_sequence` call returns `start`.
pub(crate) fn create_sequence_sql(name: &str) -> Result<(String, String), SqlTxnError> {
    validate_sequence_name(name)?;
    let create = format!("CREATE TABLE IF NOT EXISTS {name} (value INTEGER NOT NULL)");
    let seed = format!(
        "INSERT INTO {name} (value) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM {name})"
    );
    Ok((create, seed))
}
