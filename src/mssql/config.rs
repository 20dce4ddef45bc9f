use tiberius::{Client, Config as TiberiusConfig, SqlBrowser};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use super::connection::MssqlConnection;
use crate::backend::Backend;
use crate::error::DataAccessError;
use crate::types::DatabaseType;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Options for opening SQL Server connections.
///
/// Connection strings are parsed by tiberius itself, so every ADO.NET key it
/// understands (encryption modes, certificates, application name, named
/// instances) carries through unchanged.
#[derive(Debug, Clone)]
pub struct MssqlOptions {
    config: TiberiusConfig,
}

impl MssqlOptions {
    #[must_use]
    pub fn new(config: TiberiusConfig) -> Self {
        Self { config }
    }

    /// Parse an ADO-style string such as
    /// `Server=tcp:db,1433;Database=app;User Id=sa;Password=...;TrustServerCertificate=true`.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` when tiberius rejects the string or
    /// when it asks for integrated security, which this build cannot perform.
    pub fn from_connection_string(input: &str) -> Result<Self, DataAccessError> {
        if asks_for_integrated_security(input) {
            return Err(DataAccessError::Config(
                "SQL Server integrated security is not supported; supply User ID and Password".to_string(),
            ));
        }
        let config = TiberiusConfig::from_ado_string(input)
            .map_err(|e| DataAccessError::Config(format!("invalid SQL Server connection string: {e}")))?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &TiberiusConfig {
        &self.config
    }

    /// `host:port` the first TCP connection goes to. For a named instance
    /// without a port this is the SQL Browser port on the host.
    #[must_use]
    pub fn address(&self) -> String {
        self.config.get_addr()
    }
}

/// Without Windows SSPI or GSSAPI support tiberius falls back to a SQL login
/// with an empty user name, so the request has to be refused up front.
fn asks_for_integrated_security(input: &str) -> bool {
    input.split(';').any(|pair| {
        let Some((key, value)) = pair.split_once('=') else {
            return false;
        };
        let key: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        let value = value.trim().trim_matches(|c: char| c == '\'' || c == '"' || c == '{' || c == '}');
        key.eq_ignore_ascii_case("integratedsecurity")
            && !["false", "no", "0"].iter().any(|off| value.eq_ignore_ascii_case(off))
    })
}

/// SQL Server engine. Each connection drives tiberius from its own
/// current-thread runtime, so callers stay synchronous.
#[derive(Debug, Clone)]
pub struct MssqlBackend {
    opts: MssqlOptions,
}

impl MssqlBackend {
    #[must_use]
    pub fn new(opts: MssqlOptions) -> Self {
        Self { opts }
    }

    #[must_use]
    pub fn options(&self) -> &MssqlOptions {
        &self.opts
    }
}

impl Backend for MssqlBackend {
    type Connection = MssqlConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    fn connect(&self) -> Result<MssqlConnection, DataAccessError> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DataAccessError::Connection(format!("failed to start runtime: {e}")))?;
        let client = rt.block_on(create_mssql_client(self.opts.config.clone()))?;
        debug!(address = %self.opts.address(), "sql server connection opened");
        Ok(MssqlConnection::new(rt, client))
    }
}

/// Open a TCP stream and run the TDS handshake. A named instance is first
/// resolved to its port through the SQL Browser service.
///
/// # Errors
/// Returns `DataAccessError::Connection` if the lookup, the socket or the login fails.
pub async fn create_mssql_client(config: TiberiusConfig) -> Result<MssqlClient, DataAccessError> {
    let tcp = TcpStream::connect_named(&config)
        .await
        .map_err(|e| DataAccessError::Connection(format!("TCP connection error: {e}")))?;
    tcp.set_nodelay(true)
        .map_err(|e| DataAccessError::Connection(format!("TCP configuration error: {e}")))?;

    Client::connect(config, tcp.compat_write())
        .await
        .map_err(|e| DataAccessError::Connection(format!("SQL Server connection error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ado_string_is_parsed_by_tiberius() -> Result<(), Box<dyn std::error::Error>> {
        let opts = MssqlOptions::from_connection_string(
            "Server=tcp:db.local,1444;Initial Catalog=orders;User ID=app;Password=pw;TrustServerCertificate=false",
        )?;
        assert_eq!(opts.address(), "db.local:1444");
        Ok(())
    }

    #[test]
    fn named_instance_goes_through_the_browser_port() -> Result<(), Box<dyn std::error::Error>> {
        let opts = MssqlOptions::from_connection_string("Data Source=dbhost\\SQLEXPRESS;UID=sa;PWD=x")?;
        assert_eq!(opts.address(), "dbhost:1434");
        Ok(())
    }

    #[test]
    fn integrated_security_is_refused() {
        for input in [
            "Server=dbhost;Database=app;Integrated Security=true",
            "Server=dbhost;Database=app;integrated security = SSPI",
        ] {
            assert!(matches!(
                MssqlOptions::from_connection_string(input),
                Err(DataAccessError::Config(_))
            ));
        }
        assert!(
            MssqlOptions::from_connection_string("Server=dbhost;Integrated Security=false;UID=sa;PWD=x")
                .is_ok()
        );
    }
}
