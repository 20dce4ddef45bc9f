use std::sync::Arc;

use super::row::{Columns, Row};
use crate::types::RowValues;

/// Rows returned by a select, fully materialised in memory.
///
/// Built incrementally by the backend adapters: set the columns once, then
/// append one row at a time. An empty `RowSet` is also what a failed select
/// returns, so "no rows" and "query failed" look the same to callers.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    columns: Arc<Columns>,
    rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set with the given columns and row capacity.
    #[must_use]
    pub fn with_columns(column_names: Vec<String>, capacity: usize) -> Self {
        Self {
            columns: Arc::new(Columns::new(column_names)),
            rows: Vec::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.columns.names
    }

    /// Append a row; values are matched to columns by position.
    pub fn push_row(&mut self, values: Vec<RowValues>) {
        self.rows.push(Row::new(Arc::clone(&self.columns), values));
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First column of the first row, if any row exists.
    #[must_use]
    pub fn first_value(&self) -> Option<&RowValues> {
        self.rows.first().and_then(|row| row.get_by_index(0))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
