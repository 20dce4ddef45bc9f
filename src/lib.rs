//! Blocking data-access layer over two SQL stores.
//!
//! A [`DataAccessLayer`] talks to a *primary* and a *secondary* store. Each
//! store offers single-statement operations (`select_one`, `insert_one`,
//! `update_one`, `delete_one`, `scalar_one`, `stored_proc`) and all-or-nothing
//! batches (`run_batch`). [`DataAccessLayer::run_mixed`] runs a batch on each
//! store in one call.
//!
//! Every call opens its own connections and closes them before returning.
//! Faults are logged with `tracing` and reported through sentinel values
//! instead of errors: `-1` for counts, `false` for inserts, an empty
//! [`RowSet`] for selects and `None` for scalars. An empty result and a
//! failed query therefore look the same.
//!
//! # Cross-store calls are not atomic
//!
//! `run_mixed` uses one local transaction per store and commits the secondary
//! before the primary. If the primary commit fails after the secondary commit
//! has gone through, the secondary's changes stay and the primary's are rolled
//! back. The call returns `-1` like any other failure. See [`mixed`].
//!
//! ```no_run
//! use dual_sql_middleware::prelude::*;
//!
//! # fn main() -> Result<(), DataAccessError> {
//! let layer = DataAccessLayer::from_sources(&ConfigSources::new())?;
//! let inserted = layer.primary().insert_one(
//!     "INSERT INTO orders (id, note) VALUES (@id, @note)",
//!     Some(Params::new().with("id", 7).with("note", "rush")),
//! );
//! let moved = layer.run_mixed(
//!     Some(vec!["UPDATE orders SET synced = 1 WHERE id = @id".to_string()]),
//!     Some(vec![Params::new().with("id", 7)]),
//!     Some(vec!["INSERT INTO ledger (order_id) VALUES (@id)".to_string()]),
//!     Some(vec![Params::new().with("id", 7)]),
//! )?;
//! assert!(inserted && moved != -1);
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(feature = "mssql", feature = "postgres", feature = "sqlite")))]
compile_error!("enable at least one backend feature: mssql, postgres or sqlite");

pub mod backend;
pub mod batch;
pub mod config;
pub mod connstr;
pub mod error;
pub mod executor;
pub mod facade;
pub mod mixed;
pub mod params;
pub mod prelude;
pub mod results;
pub mod scope;
pub mod transaction;
pub mod translation;
pub mod types;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "test-utils-postgres")]
pub mod test_utils;

pub use backend::{AnyBackend, AnyConnection, Backend, BackendConnection};
pub use config::{ConfigSources, ConnectionSettings, StoreSettings};
pub use error::DataAccessError;
pub use facade::{DataAccessLayer, Request, StoreHandle};
pub use params::{Batch, Params, Statement};
pub use results::{ExecutionResult, FAILURE, Row, RowSet, TaggedResult};
pub use transaction::Tx;
pub use types::{CommandKind, DatabaseType, IsolationLevel, RowValues, Store};
