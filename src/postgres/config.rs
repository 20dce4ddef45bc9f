use std::str::FromStr;
use std::time::Duration;

use tokio_postgres::NoTls;
use tracing::{debug, warn};

use super::connection::PostgresConnection;
use crate::backend::Backend;
use crate::connstr::ConnectionParts;
use crate::error::DataAccessError;
use crate::types::DatabaseType;

const DEFAULT_PORT: u16 = 5432;

/// Options for opening Postgres connections.
#[derive(Debug, Clone)]
pub struct PostgresOptions {
    pub config: tokio_postgres::Config,
}

impl PostgresOptions {
    #[must_use]
    pub fn new(config: tokio_postgres::Config) -> Self {
        Self { config }
    }

    /// Accepts a `postgres://` URL, a libpq `key=value` string, or an
    /// ADO/ODBC-style `Host=...;Database=...;Username=...` string.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` if the string cannot be parsed or
    /// names no host or database.
    pub fn from_connection_string(input: &str) -> Result<Self, DataAccessError> {
        let trimmed = input.trim();
        let config = if trimmed.starts_with("postgres://")
            || trimmed.starts_with("postgresql://")
            || !trimmed.contains(';')
        {
            tokio_postgres::Config::from_str(trimmed)
                .map_err(|e| DataAccessError::Config(format!("invalid Postgres connection string: {e}")))?
        } else {
            from_parts(&ConnectionParts::parse(trimmed)?)?
        };

        if config.get_hosts().is_empty() {
            return Err(DataAccessError::Config("Postgres connection string needs a host".to_string()));
        }
        if config.get_dbname().is_none() {
            return Err(DataAccessError::Config("Postgres connection string needs a database".to_string()));
        }
        Ok(Self { config })
    }
}

fn from_parts(parts: &ConnectionParts) -> Result<tokio_postgres::Config, DataAccessError> {
    let mut config = tokio_postgres::Config::new();
    if let Some(address) = parts.server_address()? {
        config.host(&address.host);
        config.port(address.port.unwrap_or(DEFAULT_PORT));
    }
    if let Some(db) = &parts.database {
        config.dbname(db);
    }
    if let Some(user) = &parts.user {
        config.user(user);
    }
    if let Some(password) = &parts.password {
        config.password(password);
    }
    if let Some(app) = parts.get("application name") {
        config.application_name(app);
    }
    if let Some(secs) = parts.get("timeout").or_else(|| parts.get("connect timeout")) {
        let secs: u64 = secs
            .parse()
            .map_err(|e| DataAccessError::Config(format!("invalid Timeout '{secs}': {e}")))?;
        config.connect_timeout(Duration::from_secs(secs));
    }
    Ok(config)
}

/// Postgres engine. Each connection owns a current-thread runtime that
/// also drives the tokio-postgres connection task.
#[derive(Debug, Clone)]
pub struct PostgresBackend {
    opts: PostgresOptions,
}

impl PostgresBackend {
    #[must_use]
    pub fn new(opts: PostgresOptions) -> Self {
        Self { opts }
    }

    #[must_use]
    pub fn options(&self) -> &PostgresOptions {
        &self.opts
    }
}

impl Backend for PostgresBackend {
    type Connection = PostgresConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn connect(&self) -> Result<PostgresConnection, DataAccessError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DataAccessError::Connection(format!("failed to start runtime: {e}")))?;
        let (client, connection) = rt.block_on(self.opts.config.connect(NoTls))?;
        let task = rt.spawn(async move {
            if let Err(e) = connection.await {
                warn!(error = %e, "postgres connection task ended with an error");
            }
        });
        debug!(dbname = ?self.opts.config.get_dbname(), "postgres connection opened");
        Ok(PostgresConnection::new(rt, client, task))
    }
}
