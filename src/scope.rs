use std::ops::{Deref, DerefMut};

use tracing::{debug, warn};

use crate::backend::{Backend, BackendConnection};
use crate::error::DataAccessError;

/// One connection, owned for the length of one public call.
///
/// The connection is closed when the scope drops, whichever way the call
/// ends. A close error is logged and otherwise ignored.
pub struct ConnectionScope<C: BackendConnection> {
    conn: C,
}

impl<C: BackendConnection> ConnectionScope<C> {
    /// Open a fresh connection from `backend`.
    ///
    /// # Errors
    /// Returns `DataAccessError` when the connection cannot be opened.
    pub fn open<B>(backend: &B) -> Result<Self, DataAccessError>
    where
        B: Backend<Connection = C> + ?Sized,
    {
        let conn = backend.connect()?;
        debug!(database = %conn.database_type(), "connection scope opened");
        Ok(Self { conn })
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: BackendConnection> Deref for ConnectionScope<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.conn
    }
}

impl<C: BackendConnection> DerefMut for ConnectionScope<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.conn
    }
}

impl<C: BackendConnection> Drop for ConnectionScope<C> {
    fn drop(&mut self) {
        let database = self.conn.database_type();
        match self.conn.close() {
            Ok(()) => debug!(%database, "connection scope closed"),
            Err(e) => warn!(%database, error = %e, "closing connection failed"),
        }
    }
}
