//! Named-parameter binding for drivers that only understand positional
//! placeholders.
//!
//! SQL Server (through tiberius) wants `@P1, @P2, ...` and Postgres wants
//! `$1, $2, ...`; callers write `@name` (or `:name` on Postgres) and hand
//! over a [`Params`] map. The rewrite walks the SQL with a small state
//! machine that skips quoted strings, quoted identifiers, comments and
//! dollar-quoted bodies. It may still miss exotic dialect corners; prefer
//! plain placeholders in those cases.

use std::fmt::Write;

mod scanner;

use scanner::{
    State, is_block_comment_end, is_block_comment_start, is_line_comment_start, matches_tag,
    scan_identifier, try_start_dollar_quote,
};

use crate::error::DataAccessError;
use crate::params::Params;
use crate::types::RowValues;

/// Target placeholder style for the rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// tiberius-style `@P1`
    Mssql,
    /// Postgres-style `$1`
    Postgres,
}

impl PlaceholderStyle {
    fn push_placeholder(self, buf: &mut String, ordinal: usize) {
        // Writing into a String cannot fail.
        let _ = match self {
            PlaceholderStyle::Mssql => write!(buf, "@P{ordinal}"),
            PlaceholderStyle::Postgres => write!(buf, "${ordinal}"),
        };
    }
}

/// SQL rewritten to positional placeholders plus the values in ordinal order.
#[derive(Debug)]
pub struct BoundSql<'p> {
    pub sql: String,
    pub values: Vec<&'p RowValues>,
}

/// Rewrite named placeholders to `target` and collect their values.
///
/// A name that has no entry in `params` is left untouched (T-SQL local
/// variables look exactly like parameters); the server reports it if it is
/// really undeclared. Repeated names reuse their first ordinal.
///
/// # Errors
/// Returns `DataAccessError::Parameter` if a supplied parameter is never
/// referenced by the statement, or if two keys name the same parameter.
pub fn bind_named<'p>(
    sql: &str,
    params: Option<&'p Params>,
    target: PlaceholderStyle,
) -> Result<BoundSql<'p>, DataAccessError> {
    let Some(params) = params.filter(|p| !p.is_empty()) else {
        return Ok(BoundSql {
            sql: sql.to_owned(),
            values: Vec::new(),
        });
    };
    let named = params.normalized()?;

    let mut order: Vec<&'p str> = Vec::with_capacity(named.len());
    let mut values: Vec<&'p RowValues> = Vec::with_capacity(named.len());
    let mut out = String::with_capacity(sql.len() + 8);
    let mut copied = 0;
    let mut state = State::Normal;
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' if target == PlaceholderStyle::Mssql => state = State::Bracketed,
                _ if is_line_comment_start(bytes, idx) => state = State::LineComment,
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' if target == PlaceholderStyle::Postgres => {
                    if let Some((tag, advance)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = advance;
                    }
                }
                b'@' | b':' => {
                    let sigil_applies = b == b'@' || target == PlaceholderStyle::Postgres;
                    if bytes.get(idx + 1) == Some(&b) {
                        // `@@ROWCOUNT` or a `::cast`
                        idx += 1;
                    } else if sigil_applies
                        && let Some((end, ident)) = scan_identifier(bytes, idx + 1)
                    {
                        if let Some((&name, &value)) = named.get_key_value(ident) {
                            let ordinal = match order.iter().position(|n| *n == name) {
                                Some(pos) => pos + 1,
                                None => {
                                    order.push(name);
                                    values.push(value);
                                    order.len()
                                }
                            };
                            out.push_str(&sql[copied..idx]);
                            target.push_placeholder(&mut out, ordinal);
                            copied = end;
                        }
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if bytes.get(idx + 1) == Some(&b']') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }
    out.push_str(&sql[copied..]);

    if let Some(unused) = named.keys().find(|name| !order.contains(*name)) {
        return Err(DataAccessError::Parameter(format!(
            "parameter '{unused}' is not referenced by the statement"
        )));
    }

    Ok(BoundSql { sql: out, values })
}

/// Build the call text for a stored procedure, binding every parameter by
/// name: `EXEC name @a = @P1, ...` on SQL Server, `CALL name(a => $1, ...)` on
/// Postgres.
///
/// # Errors
/// Returns `DataAccessError::Parameter` for an empty procedure name or
/// clashing parameter keys.
pub fn procedure_call<'p>(
    name: &str,
    params: Option<&'p Params>,
    target: PlaceholderStyle,
) -> Result<BoundSql<'p>, DataAccessError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DataAccessError::Parameter(
            "stored procedure name is empty".to_string(),
        ));
    }
    let named = params.map(Params::normalized).transpose()?.unwrap_or_default();

    let mut sql = String::with_capacity(name.len() + 16 * named.len() + 8);
    let mut values = Vec::with_capacity(named.len());
    match target {
        PlaceholderStyle::Mssql => {
            sql.push_str("EXEC ");
            sql.push_str(name);
            for (i, (key, value)) in named.into_iter().enumerate() {
                sql.push_str(if i == 0 { " @" } else { ", @" });
                sql.push_str(key);
                sql.push_str(" = ");
                target.push_placeholder(&mut sql, i + 1);
                values.push(value);
            }
        }
        PlaceholderStyle::Postgres => {
            sql.push_str("CALL ");
            sql.push_str(name);
            sql.push('(');
            for (i, (key, value)) in named.into_iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(key);
                sql.push_str(" => ");
                target.push_placeholder(&mut sql, i + 1);
                values.push(value);
            }
            sql.push(')');
        }
    }
    Ok(BoundSql { sql, values })
}
