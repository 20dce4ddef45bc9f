// PostgreSQL module - adapter over tokio-postgres
//
// - config: connection-string parsing and the `Backend`
// - params: `ToSql` for `RowValues`
// - query: result extraction and statement execution
// - connection: the `BackendConnection` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{PostgresBackend, PostgresOptions};
pub use connection::PostgresConnection;
