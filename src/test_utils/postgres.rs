use postgresql_embedded::PostgreSQL;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::error::DataAccessError;
use crate::postgres::{PostgresBackend, PostgresOptions};

/// A throwaway Postgres server for tests, stopped when dropped.
pub struct EmbeddedPostgres {
    postgresql: PostgreSQL,
    connection_string: String,
    rt: Runtime,
}

impl EmbeddedPostgres {
    /// Start a server from the bundled binaries and create `database` on it.
    ///
    /// # Errors
    /// Returns an error if the runtime cannot be built or the server cannot
    /// be set up, started or provisioned.
    pub fn start(database: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let mut postgresql = PostgreSQL::default();
        rt.block_on(async {
            postgresql.setup().await?;
            postgresql.start().await?;
            postgresql.create_database(database).await
        })?;

        let settings = postgresql.settings();
        let connection_string = format!(
            "host={} port={} user={} password={} dbname={database}",
            settings.host, settings.port, settings.username, settings.password
        );
        debug!(port = settings.port, database, "embedded postgres started");
        Ok(Self {
            postgresql,
            connection_string,
            rt,
        })
    }

    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// A backend pointed at the test database.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` if the connection string is rejected.
    pub fn backend(&self) -> Result<PostgresBackend, DataAccessError> {
        Ok(PostgresBackend::new(PostgresOptions::from_connection_string(
            &self.connection_string,
        )?))
    }
}

impl Drop for EmbeddedPostgres {
    fn drop(&mut self) {
        if let Err(e) = self.rt.block_on(self.postgresql.stop()) {
            warn!(error = %e, "stopping embedded postgres failed");
        }
    }
}
