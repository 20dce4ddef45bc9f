//! Convenient imports for common functionality.

pub use crate::backend::{AnyBackend, Backend, BackendConnection};
pub use crate::config::{ConfigSources, ConnectionSettings, StoreSettings};
pub use crate::error::DataAccessError;
pub use crate::executor::ExecTarget;
pub use crate::facade::{DataAccessLayer, Request, StoreHandle};
pub use crate::params::{Batch, Params, Statement};
pub use crate::results::{ExecutionResult, FAILURE, RowSet, TaggedResult};
pub use crate::transaction::Tx;
pub use crate::types::{CommandKind, DatabaseType, IsolationLevel, RowValues, Store};

#[cfg(feature = "mssql")]
pub use crate::mssql::{MssqlBackend, MssqlOptions};
#[cfg(feature = "postgres")]
pub use crate::postgres::{PostgresBackend, PostgresOptions};
#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteBackend, SqliteOptions};
