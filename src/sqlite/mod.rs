// SQLite module - embedded engine adapter
//
// - config: options parsed from a connection string, and the `Backend`
// - params: value conversion and named binding onto a prepared statement
// - query: row materialisation
// - connection: the `BackendConnection` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{SqliteBackend, SqliteOptions};
pub use connection::SqliteConnection;
