use super::{Backend, BackendConnection};
use crate::config::StoreSettings;
use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::RowSet;
use crate::types::{DatabaseType, IsolationLevel, RowValues};

#[cfg(feature = "mssql")]
use crate::mssql::{MssqlBackend, MssqlConnection, MssqlOptions};
#[cfg(feature = "postgres")]
use crate::postgres::{PostgresBackend, PostgresConnection, PostgresOptions};
#[cfg(feature = "sqlite")]
use crate::sqlite::{SqliteBackend, SqliteConnection, SqliteOptions};

/// Any compiled-in engine, chosen at runtime from a [`DatabaseType`].
#[derive(Debug, Clone)]
pub enum AnyBackend {
    #[cfg(feature = "mssql")]
    Mssql(MssqlBackend),
    #[cfg(feature = "postgres")]
    Postgres(PostgresBackend),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteBackend),
}

/// A connection opened by an [`AnyBackend`].
pub enum AnyConnection {
    #[cfg(feature = "mssql")]
    Mssql(MssqlConnection),
    #[cfg(feature = "postgres")]
    Postgres(PostgresConnection),
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteConnection),
}

macro_rules! dispatch {
    ($value:expr, $inner:ident => $body:expr) => {
        match $value {
            #[cfg(feature = "mssql")]
            Self::Mssql($inner) => $body,
            #[cfg(feature = "postgres")]
            Self::Postgres($inner) => $body,
            #[cfg(feature = "sqlite")]
            Self::Sqlite($inner) => $body,
        }
    };
}

impl AnyBackend {
    /// Build the engine a store's settings name.
    ///
    /// The connection string is only parsed here; nothing is opened.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` for an unparsable connection string and
    /// `DataAccessError::Unsupported` when the engine's feature is not compiled in.
    pub fn from_settings(settings: &StoreSettings) -> Result<Self, DataAccessError> {
        let conn_str = settings.connection_string.as_str();
        match settings.database_type {
            #[cfg(feature = "mssql")]
            DatabaseType::Mssql => Ok(Self::Mssql(MssqlBackend::new(
                MssqlOptions::from_connection_string(conn_str)?,
            ))),
            #[cfg(feature = "postgres")]
            DatabaseType::Postgres => Ok(Self::Postgres(PostgresBackend::new(
                PostgresOptions::from_connection_string(conn_str)?,
            ))),
            #[cfg(feature = "sqlite")]
            DatabaseType::Sqlite => Ok(Self::Sqlite(SqliteBackend::new(
                SqliteOptions::from_connection_string(conn_str)?,
            ))),
            #[allow(unreachable_patterns)]
            other => Err(DataAccessError::Unsupported(format!(
                "{other} support is not compiled in"
            ))),
        }
    }
}

#[cfg(feature = "mssql")]
impl From<MssqlBackend> for AnyBackend {
    fn from(backend: MssqlBackend) -> Self {
        Self::Mssql(backend)
    }
}

#[cfg(feature = "postgres")]
impl From<PostgresBackend> for AnyBackend {
    fn from(backend: PostgresBackend) -> Self {
        Self::Postgres(backend)
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteBackend> for AnyBackend {
    fn from(backend: SqliteBackend) -> Self {
        Self::Sqlite(backend)
    }
}

impl Backend for AnyBackend {
    type Connection = AnyConnection;

    fn database_type(&self) -> DatabaseType {
        dispatch!(self, b => b.database_type())
    }

    fn connect(&self) -> Result<AnyConnection, DataAccessError> {
        match self {
            #[cfg(feature = "mssql")]
            Self::Mssql(b) => b.connect().map(AnyConnection::Mssql),
            #[cfg(feature = "postgres")]
            Self::Postgres(b) => b.connect().map(AnyConnection::Postgres),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(b) => b.connect().map(AnyConnection::Sqlite),
        }
    }
}

impl BackendConnection for AnyConnection {
    fn database_type(&self) -> DatabaseType {
        dispatch!(self, c => c.database_type())
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DataAccessError> {
        dispatch!(self, c => c.begin(isolation))
    }

    fn commit(&mut self) -> Result<(), DataAccessError> {
        dispatch!(self, c => c.commit())
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        dispatch!(self, c => c.rollback())
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet, DataAccessError> {
        dispatch!(self, c => c.query(statement))
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, DataAccessError> {
        dispatch!(self, c => c.execute(statement))
    }

    fn scalar(&mut self, statement: &Statement) -> Result<Option<RowValues>, DataAccessError> {
        dispatch!(self, c => c.scalar(statement))
    }

    fn close(&mut self) -> Result<(), DataAccessError> {
        dispatch!(self, c => c.close())
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;

    #[test]
    fn settings_pick_the_engine() -> Result<(), Box<dyn std::error::Error>> {
        let backend = AnyBackend::from_settings(&StoreSettings::new(DatabaseType::Sqlite, "/tmp/x.db"))?;
        assert_eq!(backend.database_type(), DatabaseType::Sqlite);
        Ok(())
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn bad_connection_string_is_a_config_error() {
        let err = AnyBackend::from_settings(&StoreSettings::new(DatabaseType::Postgres, "Host=;Port=x"))
            .unwrap_err();
        assert!(matches!(err, DataAccessError::Config(_)));
    }
}
