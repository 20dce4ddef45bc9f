use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures_util::{TryStreamExt, pin_mut};
use serde_json::Value;
use tokio_postgres::Client;
use tokio_postgres::types::Type;

use super::params::as_refs;
use crate::error::DataAccessError;
use crate::results::RowSet;
use crate::types::RowValues;

/// Prepare, run and materialise a row-returning statement. Column names come
/// from the prepared statement so an empty result still carries them.
///
/// # Errors
/// Returns `DataAccessError` from preparation, execution or value extraction.
pub async fn build_result_set(
    client: &Client,
    sql: &str,
    params: &[&RowValues],
) -> Result<RowSet, DataAccessError> {
    let stmt = client.prepare(sql).await?;
    let rows = client.query(&stmt, &as_refs(params)).await?;

    let column_names: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect();
    let column_count = column_names.len();

    let mut result_set = RowSet::with_columns(column_names, rows.len());
    for row in &rows {
        let mut row_values = Vec::with_capacity(column_count);
        for idx in 0..column_count {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.push_row(row_values);
    }

    Ok(result_set)
}

/// Run a statement for its affected-row count.
///
/// # Errors
/// Returns `DataAccessError` from execution.
pub async fn execute_affected(
    client: &Client,
    sql: &str,
    params: &[&RowValues],
) -> Result<u64, DataAccessError> {
    Ok(client.execute(sql, &as_refs(params)).await?)
}

/// First column of the first row, reading no further than that row.
///
/// # Errors
/// Returns `DataAccessError` from preparation, execution or value extraction.
pub async fn first_value(
    client: &Client,
    sql: &str,
    params: &[&RowValues],
) -> Result<Option<RowValues>, DataAccessError> {
    let stmt = client.prepare(sql).await?;
    if stmt.columns().is_empty() {
        client.execute(&stmt, &as_refs(params)).await?;
        return Ok(None);
    }
    let rows = client.query_raw(&stmt, params.iter().copied()).await?;
    pin_mut!(rows);
    match rows.try_next().await? {
        Some(row) => Ok(Some(postgres_extract_value(&row, 0)?)),
        None => Ok(None),
    }
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// # Errors
/// Returns `DataAccessError` if the column cannot be retrieved.
pub fn postgres_extract_value(
    row: &tokio_postgres::Row,
    idx: usize,
) -> Result<RowValues, DataAccessError> {
    let type_info = row.columns()[idx].type_().clone();

    let value = match type_info {
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(|v| RowValues::Int(i64::from(v))),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(|v| RowValues::Int(i64::from(v))),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(RowValues::Int),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|v| RowValues::Float(f64::from(v))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(RowValues::Float),
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(RowValues::Bool),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(RowValues::Timestamp),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|v| RowValues::Timestamp(v.and_time(chrono::NaiveTime::MIN))),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?.map(RowValues::JSON),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(RowValues::Blob),
        // text-like types, and anything else that decodes as a string
        _ => row.try_get::<_, Option<String>>(idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}
