use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DataAccessError;
use crate::results::RowSet;
use crate::types::RowValues;

/// Extract a `RowValues` from a `SQLite` row.
///
/// # Errors
///
/// Returns `DataAccessError` if the value cannot be read.
pub fn sqlite_extract_value(row: &rusqlite::Row, idx: usize) -> Result<RowValues, DataAccessError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

/// Run an already-bound statement and materialise every row.
///
/// # Errors
/// Returns `DataAccessError` if stepping the statement or reading a value fails.
pub fn build_result_set(stmt: &mut Statement<'_>) -> Result<RowSet, DataAccessError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let col_count = column_names.len();
    let mut result_set = RowSet::with_columns(column_names, 16);

    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(sqlite_extract_value(row, i)?);
        }
        result_set.push_row(row_values);
    }

    Ok(result_set)
}

/// Run an already-bound statement and read the first column of its first
/// row only. A statement with no result columns is executed for its effect.
///
/// # Errors
/// Returns `DataAccessError` if stepping the statement or reading the value fails.
pub fn first_value(stmt: &mut Statement<'_>) -> Result<Option<RowValues>, DataAccessError> {
    if stmt.column_count() == 0 {
        stmt.raw_execute()?;
        return Ok(None);
    }
    let mut rows = stmt.raw_query();
    match rows.next()? {
        Some(row) => Ok(Some(sqlite_extract_value(row, 0)?)),
        None => Ok(None),
    }
}
