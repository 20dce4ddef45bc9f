use crate::backend::BackendConnection;
use crate::transaction::Tx;
use crate::types::DatabaseType;

/// Where an executor function runs its statement.
///
/// A bare connection means the executor opens, and resolves, its own
/// read-committed transaction. A borrowed [`Tx`] is used as-is; the executor
/// never commits or rolls it back.
pub enum ExecTarget<'a, 'c, C: BackendConnection> {
    Connection(&'a mut C),
    Transaction(&'a mut Tx<'c, C>),
}

impl<C: BackendConnection> ExecTarget<'_, '_, C> {
    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        match self {
            ExecTarget::Connection(conn) => conn.database_type(),
            ExecTarget::Transaction(tx) => tx.database_type(),
        }
    }
}

impl<'a, C: BackendConnection> From<&'a mut C> for ExecTarget<'a, '_, C> {
    fn from(conn: &'a mut C) -> Self {
        ExecTarget::Connection(conn)
    }
}

impl<'a, 'c, C: BackendConnection> From<&'a mut Tx<'c, C>> for ExecTarget<'a, 'c, C> {
    fn from(tx: &'a mut Tx<'c, C>) -> Self {
        ExecTarget::Transaction(tx)
    }
}
