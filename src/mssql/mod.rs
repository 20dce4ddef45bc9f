// MSSQL module - SQL Server adapter over tiberius
//
// - config: options parsed from an ADO string, client creation, and the `Backend`
// - params: positional value binding onto a tiberius `Query`
// - query: result extraction and statement execution
// - connection: the `BackendConnection` implementation

pub mod config;
pub mod connection;
pub mod params;
pub mod query;

pub use config::{MssqlBackend, MssqlClient, MssqlOptions};
pub use connection::MssqlConnection;
