use thiserror::Error;

#[cfg(feature = "sqlite")]
use rusqlite;
#[cfg(feature = "mssql")]
use tiberius;
#[cfg(feature = "postgres")]
use tokio_postgres;

/// Every fault the layer can observe internally.
///
/// Public operations never hand these to the caller (they collapse into the
/// sentinel values `-1`, `false`, an empty `RowSet` or `None`); the one
/// exception is [`DataAccessError::Validation`], which batch entry points
/// raise before any connection is opened.
#[derive(Debug, Error)]
pub enum DataAccessError {
    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "mssql")]
    #[error(transparent)]
    Mssql(#[from] tiberius::error::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Parameter binding error: {0}")]
    Parameter(String),

    #[error("SQL execution error: {0}")]
    Execution(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl DataAccessError {
    /// True for caller mistakes detected before touching a backend.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, DataAccessError::Validation(_))
    }
}
