use tracing::warn;

use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::types::{DatabaseType, IsolationLevel};

/// An open transaction on a borrowed connection.
///
/// Whoever calls [`Tx::begin`] owns the outcome. Passing `&mut Tx` to an
/// executor function lends the transaction without handing over that
/// responsibility: the executor runs its statement and leaves commit and
/// rollback to the owner.
///
/// Dropping a `Tx` that is still open rolls it back. That includes a `Tx`
/// whose [`commit`](Tx::commit) failed, since a failed commit leaves the
/// transaction open on the server.
pub struct Tx<'c, C: BackendConnection> {
    conn: &'c mut C,
    open: bool,
}

impl<'c, C: BackendConnection> Tx<'c, C> {
    /// Begin a transaction on `conn`.
    ///
    /// # Errors
    /// Returns `DataAccessError` if the engine refuses to start the transaction.
    pub fn begin(conn: &'c mut C, isolation: IsolationLevel) -> Result<Self, DataAccessError> {
        conn.begin(isolation)?;
        Ok(Self { conn, open: true })
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.conn.database_type()
    }

    /// The connection the transaction runs on.
    pub fn connection(&mut self) -> &mut C {
        &mut *self.conn
    }

    /// Commit the transaction.
    ///
    /// # Errors
    /// Returns `DataAccessError` if the commit fails; the still-open
    /// transaction is then rolled back as this `Tx` drops.
    pub fn commit(mut self) -> Result<(), DataAccessError> {
        self.conn.commit()?;
        self.open = false;
        Ok(())
    }

    /// Roll the transaction back.
    ///
    /// # Errors
    /// Returns `DataAccessError` if the rollback fails.
    pub fn rollback(mut self) -> Result<(), DataAccessError> {
        self.open = false;
        self.conn.rollback()
    }
}

impl<C: BackendConnection> Drop for Tx<'_, C> {
    fn drop(&mut self) {
        if self.open {
            let database = self.conn.database_type();
            if let Err(e) = self.conn.rollback() {
                warn!(%database, error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}
