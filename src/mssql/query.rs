use chrono::NaiveDateTime;
use futures_util::TryStreamExt;
use tiberius::Query;

use super::config::MssqlClient;
use super::params::bind_query_params;
use crate::error::DataAccessError;
use crate::results::RowSet;
use crate::types::RowValues;

/// Run a row-returning statement and materialise every row.
///
/// A statement that produces no result set (a DML without `OUTPUT`)
/// yields an empty `RowSet` with no columns.
///
/// # Errors
/// Returns `DataAccessError` if the query fails or a row cannot be read.
pub async fn build_result_set(
    client: &mut MssqlClient,
    sql: &str,
    params: &[&RowValues],
) -> Result<RowSet, DataAccessError> {
    let mut query = Query::new(sql);
    bind_query_params(&mut query, params);

    let mut stream = query.query(client).await?;
    let column_names: Vec<String> = match stream.columns().await? {
        Some(columns) => columns.iter().map(|col| col.name().to_string()).collect(),
        None => Vec::new(),
    };
    let col_count = column_names.len();
    let mut result_set = RowSet::with_columns(column_names, 10);

    let mut rows_stream = stream.into_row_stream();
    while let Some(row) = rows_stream.try_next().await? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            row_values.push(extract_value(&row, i).unwrap_or(RowValues::Null));
        }
        result_set.push_row(row_values);
    }

    Ok(result_set)
}

/// First column of the first row. The rest of the stream is left unread;
/// tiberius drains it before the next request on this client.
///
/// # Errors
/// Returns `DataAccessError` if the query fails or the row cannot be read.
pub async fn first_value(
    client: &mut MssqlClient,
    sql: &str,
    params: &[&RowValues],
) -> Result<Option<RowValues>, DataAccessError> {
    let mut query = Query::new(sql);
    bind_query_params(&mut query, params);

    let mut rows = query.query(client).await?.into_row_stream();
    let first = rows.try_next().await?;
    Ok(first.map(|row| extract_value(&row, 0).unwrap_or(RowValues::Null)))
}

/// Run a statement for its affected-row count, summed over every statement
/// in the text.
///
/// # Errors
/// Returns `DataAccessError` if execution fails.
pub async fn execute_affected(
    client: &mut MssqlClient,
    sql: &str,
    params: &[&RowValues],
) -> Result<u64, DataAccessError> {
    let mut query = Query::new(sql);
    bind_query_params(&mut query, params);
    let result = query.execute(client).await?;
    Ok(result.rows_affected().iter().sum())
}

/// Send unparameterised text outside `sp_executesql`, so session-level
/// settings and `BEGIN TRANSACTION` persist on the connection.
///
/// # Errors
/// Returns `DataAccessError` if the server rejects the batch.
pub async fn simple_batch(client: &mut MssqlClient, sql: &str) -> Result<(), DataAccessError> {
    client.simple_query(sql).await?.into_results().await?;
    Ok(())
}

/// Read one cell, probing the tiberius conversions from narrowest to widest.
/// `None` covers both SQL NULL and a type with no mapping.
fn extract_value(row: &tiberius::Row, idx: usize) -> Option<RowValues> {
    if let Ok(Some(val)) = row.try_get::<i32, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<i64, _>(idx) {
        return Some(RowValues::Int(val));
    }
    if let Ok(Some(val)) = row.try_get::<i16, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<u8, _>(idx) {
        return Some(RowValues::Int(i64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<f32, _>(idx) {
        return Some(RowValues::Float(f64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<f64, _>(idx) {
        return Some(RowValues::Float(val));
    }
    if let Ok(Some(val)) = row.try_get::<tiberius::numeric::Numeric, _>(idx) {
        return Some(RowValues::Float(f64::from(val)));
    }
    if let Ok(Some(val)) = row.try_get::<bool, _>(idx) {
        return Some(RowValues::Bool(val));
    }
    if let Ok(Some(val)) = row.try_get::<NaiveDateTime, _>(idx) {
        return Some(RowValues::Timestamp(val));
    }
    if let Ok(Some(val)) = row.try_get::<&str, _>(idx) {
        return Some(RowValues::Text(val.to_string()));
    }
    if let Ok(Some(val)) = row.try_get::<&[u8], _>(idx) {
        return Some(RowValues::Blob(val.to_vec()));
    }
    None
}
