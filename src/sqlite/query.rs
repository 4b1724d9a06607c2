use rusqlite::types::ValueRef;

use crate::error::SqlTxnError;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `SqlTxnError` if the column index is out of range or the text
/// column is not valid UTF-8.
pub fn sqlite_extract_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<RowValues, SqlTxnError> {
    let value = row.get_ref(idx)?;
    match value {
        ValueRef::Null => Ok(RowValues::Null),
        ValueRef::Integer(i) => Ok(RowValues::Int(i)),
        ValueRef::Real(f) => Ok(RowValues::Float(f)),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(|s| RowValues::Text(s.to_owned()))
            .map_err(|e| SqlTxnError::DecodeError(format!("column {idx} is not UTF-8: {e}"))),
        ValueRef::Blob(bytes) => Ok(RowValues::Blob(bytes.to_vec())),
    }
}
