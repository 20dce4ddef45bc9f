use tracing::debug;

use super::params::bind_named;
use super::query::{build_result_set, first_value};
use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::RowSet;
use crate::types::{CommandKind, DatabaseType, IsolationLevel, RowValues};

/// An open `SQLite` connection.
///
/// `SQLite` has no per-transaction isolation levels; every transaction is
/// started with `BEGIN IMMEDIATE` so the write lock is taken up front and a
/// concurrent writer waits on the busy timeout instead of failing at commit.
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    pub(crate) fn new(conn: rusqlite::Connection) -> Self {
        Self { conn: Some(conn) }
    }

    fn handle(&self) -> Result<&rusqlite::Connection, DataAccessError> {
        self.conn
            .as_ref()
            .ok_or_else(|| DataAccessError::Connection("SQLite connection is closed".to_string()))
    }

    fn ensure_text(statement: &Statement) -> Result<(), DataAccessError> {
        match statement.kind() {
            CommandKind::Text => Ok(()),
            CommandKind::StoredProcedure => Err(DataAccessError::Unsupported(
                "SQLite has no stored procedures".to_string(),
            )),
        }
    }
}

impl BackendConnection for SqliteConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Sqlite
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DataAccessError> {
        debug!(?isolation, "sqlite begin immediate");
        self.handle()?.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataAccessError> {
        self.handle()?.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        let conn = self.handle()?;
        // A failed COMMIT (deferred constraint) can leave autocommit restored.
        if conn.is_autocommit() {
            return Ok(());
        }
        conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet, DataAccessError> {
        Self::ensure_text(statement)?;
        let conn = self.handle()?;
        let mut stmt = conn.prepare(statement.sql())?;
        bind_named(&mut stmt, statement.params())?;
        build_result_set(&mut stmt)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, DataAccessError> {
        Self::ensure_text(statement)?;
        let conn = self.handle()?;
        let mut stmt = conn.prepare(statement.sql())?;
        bind_named(&mut stmt, statement.params())?;
        let affected = stmt.raw_execute()?;
        Ok(affected as u64)
    }

    fn scalar(&mut self, statement: &Statement) -> Result<Option<RowValues>, DataAccessError> {
        Self::ensure_text(statement)?;
        let conn = self.handle()?;
        let mut stmt = conn.prepare(statement.sql())?;
        bind_named(&mut stmt, statement.params())?;
        first_value(&mut stmt)
    }

    fn close(&mut self) -> Result<(), DataAccessError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| DataAccessError::Sqlite(e))?;
        }
        Ok(())
    }
}
