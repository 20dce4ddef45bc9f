//! The capability set every engine adapter provides.
//!
//! The executor, batch runner and cross-store coordinator are written once
//! against these traits; each engine only has to open a connection, manage a
//! transaction on it, and run a bound statement.

mod any;

pub use any::{AnyBackend, AnyConnection};

use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::RowSet;
use crate::types::{DatabaseType, IsolationLevel, RowValues};

/// A configured engine that can hand out fresh connections.
pub trait Backend: Send + Sync {
    type Connection: BackendConnection;

    fn database_type(&self) -> DatabaseType;

    /// Open a new connection. Every public call opens its own.
    ///
    /// # Errors
    /// Returns `DataAccessError` when the engine cannot be reached.
    fn connect(&self) -> Result<Self::Connection, DataAccessError>;
}

/// A live, exclusively owned connection to one engine.
///
/// Transaction state lives on the connection: `begin` starts one, and
/// `commit`/`rollback` end it. Statements run between `begin` and the end
/// belong to that transaction.
pub trait BackendConnection {
    fn database_type(&self) -> DatabaseType;

    /// # Errors
    /// Returns `DataAccessError` if the engine refuses to start a transaction.
    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DataAccessError>;

    /// # Errors
    /// Returns `DataAccessError` if the commit fails; the transaction is then
    /// still open and must be rolled back.
    fn commit(&mut self) -> Result<(), DataAccessError>;

    /// # Errors
    /// Returns `DataAccessError` if the rollback fails.
    fn rollback(&mut self) -> Result<(), DataAccessError>;

    /// Bind and run a row-returning statement, materialising every row.
    ///
    /// # Errors
    /// Returns `DataAccessError` on binding or execution faults.
    fn query(&mut self, statement: &Statement) -> Result<RowSet, DataAccessError>;

    /// Bind and run a statement for its affected-row count.
    ///
    /// # Errors
    /// Returns `DataAccessError` on binding or execution faults.
    fn execute(&mut self, statement: &Statement) -> Result<u64, DataAccessError>;

    /// First column of the first row, `None` when no row comes back.
    ///
    /// # Errors
    /// Returns `DataAccessError` on binding or execution faults.
    fn scalar(&mut self, statement: &Statement) -> Result<Option<RowValues>, DataAccessError> {
        let rows = self.query(statement)?;
        Ok(rows.first_value().cloned())
    }

    /// Close the connection. Calling it twice is a no-op.
    ///
    /// # Errors
    /// Returns `DataAccessError` if the engine reports an error while closing.
    fn close(&mut self) -> Result<(), DataAccessError>;
}
