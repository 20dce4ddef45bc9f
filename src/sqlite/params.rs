use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::DataAccessError;
use crate::params::Params;
use crate::types::RowValues;

/// Convert a single `RowValues` to a rusqlite `Value`.
#[must_use]
pub fn row_value_to_sqlite_value(value: &RowValues) -> Value {
    match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) => Value::Real(*f),
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => Value::Text(dt.format("%F %T%.f").to_string()),
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    }
}

/// Bind named parameters onto a prepared statement.
///
/// `SQLite` accepts `:name`, `@name` and `$name` placeholders; a key is
/// matched against all three spellings. A key the statement does not declare
/// fails with rusqlite's own `InvalidParameterName`.
///
/// # Errors
/// Returns `DataAccessError` for clashing keys, unknown names or a bind failure.
pub fn bind_named(stmt: &mut Statement<'_>, params: Option<&Params>) -> Result<(), DataAccessError> {
    let Some(params) = params else {
        return Ok(());
    };
    for (name, value) in params.normalized()? {
        let idx = find_parameter(stmt, name)?
            .ok_or_else(|| rusqlite::Error::InvalidParameterName(name.to_owned()))?;
        stmt.raw_bind_parameter(idx, row_value_to_sqlite_value(value))?;
    }
    Ok(())
}

fn find_parameter(stmt: &Statement<'_>, name: &str) -> Result<Option<usize>, DataAccessError> {
    for sigil in [':', '@', '$'] {
        if let Some(idx) = stmt.parameter_index(&format!("{sigil}{name}"))? {
            return Ok(Some(idx));
        }
    }
    Ok(None)
}
