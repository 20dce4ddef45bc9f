#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dual_sql_middleware::prelude::*;
use tempfile::TempDir;

/// A file-backed SQLite database that lives as long as the value.
pub struct TempDb {
    _dir: TempDir,
    path: String,
}

impl TempDb {
    pub fn new(name: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(name).to_string_lossy().into_owned();
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn backend(&self) -> SqliteBackend {
        SqliteBackend::new(SqliteOptions::new(self.path.clone()))
    }

    /// Run setup statements outside any layer call.
    pub fn exec(&self, sql: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let mut conn = self.backend().connect()?;
        for stmt in sql {
            conn.execute(&Statement::text(*stmt))?;
        }
        conn.close()?;
        Ok(())
    }

    pub fn count(&self, table: &str) -> Result<i64, Box<dyn std::error::Error>> {
        let mut conn = self.backend().connect()?;
        let value = conn.scalar(&Statement::text(format!("SELECT COUNT(*) FROM {table}")))?;
        conn.close()?;
        value
            .and_then(|v| v.as_int().copied())
            .ok_or_else(|| format!("no count for {table}").into())
    }
}

/// Wraps a backend, counting `connect` calls and optionally refusing them.
pub struct SpyBackend<B: Backend> {
    inner: B,
    connects: AtomicUsize,
    refuse: AtomicBool,
}

impl<B: Backend> SpyBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            connects: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
        }
    }

    pub fn refusing(self) -> Self {
        self.refuse.store(true, Ordering::SeqCst);
        self
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl<B: Backend> Backend for SpyBackend<B> {
    type Connection = B::Connection;

    fn database_type(&self) -> DatabaseType {
        self.inner.database_type()
    }

    fn connect(&self) -> Result<B::Connection, DataAccessError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(DataAccessError::Connection("spy refused the connection".to_string()));
        }
        self.inner.connect()
    }
}

/// Primary and secondary SQLite databases behind counting spies.
pub fn spied_layer(
    primary: &TempDb,
    secondary: &TempDb,
) -> DataAccessLayer<SpyBackend<SqliteBackend>, SpyBackend<SqliteBackend>> {
    DataAccessLayer::new(
        SpyBackend::new(primary.backend()),
        SpyBackend::new(secondary.backend()),
    )
}
