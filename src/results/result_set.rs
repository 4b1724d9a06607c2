use std::collections::HashMap;
use std::sync::Arc;

use super::row::CustomDbRow;
use crate::types::RowValues;

/// Rows read from a query, fully materialised.
///
/// Built by draining a [`RowCursor`](crate::RowCursor); it holds no database
/// resources and may outlive the call that produced it.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    /// The rows returned by the query
    pub results: Vec<CustomDbRow>,
    column_names: Arc<Vec<String>>,
    column_index_cache: Arc<HashMap<String, usize>>,
}

impl ResultSet {
    /// Create an empty result set for the given columns.
    #[must_use]
    pub fn with_columns(column_names: Arc<Vec<String>>) -> ResultSet {
        let cache = column_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect::<HashMap<_, _>>();
        ResultSet {
            results: Vec::new(),
            column_names,
            column_index_cache: Arc::new(cache),
        }
    }

    /// Column names shared by all rows
    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Append one row of values, in column order.
    pub fn add_row_values(&mut self, row_values: Vec<RowValues>) {
        self.results.push(CustomDbRow::with_cache(
            Arc::clone(&self.column_names),
            row_values,
            Arc::clone(&self.column_index_cache),
        ));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&CustomDbRow> {
        self.results.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CustomDbRow> {
        self.results.iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a CustomDbRow;
    type IntoIter = std::slice::Iter<'a, CustomDbRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_share_column_lookup() {
        let mut rs = ResultSet::with_columns(Arc::new(vec!["id".into(), "name".into()]));
        rs.add_row_values(vec![RowValues::Int(1), RowValues::Text("a".into())]);
        rs.add_row_values(vec![RowValues::Int(2), RowValues::Null]);

        assert_eq!(rs.len(), 2);
        let second = &rs.results[1];
        assert_eq!(second.get("id"), Some(&RowValues::Int(2)));
        assert!(second.get("name").is_some_and(RowValues::is_null));
        assert!(second.get("missing").is_none());
        assert!(Arc::ptr_eq(
            &rs.results[0].column_index_cache,
            &second.column_index_cache
        ));
    }
}
