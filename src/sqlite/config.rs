use std::time::Duration;

use tracing::debug;

use super::connection::SqliteConnection;
use crate::backend::Backend;
use crate::connstr::ConnectionParts;
use crate::error::DataAccessError;
use crate::types::DatabaseType;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Options for opening `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub db_path: String,
    pub busy_timeout: Duration,
    pub foreign_keys: bool,
    pub wal: bool,
}

impl SqliteOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
            wal: true,
        }
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    #[must_use]
    pub fn with_foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    /// Accepts a bare path, or `Data Source=<path>` with optional
    /// `Busy Timeout=<ms>`, `Foreign Keys=<bool>` and `Journal Mode=<mode>`.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` for an unparsable string or a missing path.
    pub fn from_connection_string(input: &str) -> Result<Self, DataAccessError> {
        if !input.contains('=') {
            let path = input.trim();
            if path.is_empty() {
                return Err(DataAccessError::Config("SQLite path is empty".to_string()));
            }
            return Ok(Self::new(path));
        }

        let parts = ConnectionParts::parse(input)?;
        let path = parts
            .server
            .clone()
            .or_else(|| parts.database.clone())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| {
                DataAccessError::Config("SQLite connection string needs a Data Source".to_string())
            })?;

        let mut opts = Self::new(path);
        if let Some(ms) = parts.get("busy timeout") {
            let ms: u64 = ms.parse().map_err(|e| {
                DataAccessError::Config(format!("invalid Busy Timeout '{ms}': {e}"))
            })?;
            opts.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(fk) = parts.flag("foreign keys") {
            opts.foreign_keys = fk;
        }
        if let Some(mode) = parts.get("journal mode") {
            opts.wal = mode.eq_ignore_ascii_case("wal");
        }
        Ok(opts)
    }
}

/// `SQLite` engine: one file (or memory URI), one connection per call.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    opts: SqliteOptions,
}

impl SqliteBackend {
    #[must_use]
    pub fn new(opts: SqliteOptions) -> Self {
        Self { opts }
    }

    #[must_use]
    pub fn options(&self) -> &SqliteOptions {
        &self.opts
    }
}

impl Backend for SqliteBackend {
    type Connection = SqliteConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn connect(&self) -> Result<SqliteConnection, DataAccessError> {
        let conn = rusqlite::Connection::open(&self.opts.db_path)?;
        conn.busy_timeout(self.opts.busy_timeout)?;
        conn.execute_batch(if self.opts.foreign_keys {
            "PRAGMA foreign_keys = ON;"
        } else {
            "PRAGMA foreign_keys = OFF;"
        })?;
        if self.opts.wal {
            let mode: String =
                conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
            debug!(path = %self.opts.db_path, journal_mode = %mode, "sqlite connection opened");
        } else {
            debug!(path = %self.opts.db_path, "sqlite connection opened");
        }
        Ok(SqliteConnection::new(conn))
    }
}
