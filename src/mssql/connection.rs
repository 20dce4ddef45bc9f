use tokio::runtime::Runtime;
use tracing::debug;

use super::config::MssqlClient;
use super::query::{build_result_set, execute_affected, first_value, simple_batch};
use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::RowSet;
use crate::translation::{BoundSql, PlaceholderStyle, bind_named, procedure_call};
use crate::types::{CommandKind, DatabaseType, IsolationLevel, RowValues};

/// An open SQL Server connection with the runtime that drives it.
pub struct MssqlConnection {
    // dropped before the runtime that registered its socket
    client: Option<MssqlClient>,
    rt: Runtime,
}

impl MssqlConnection {
    pub(crate) fn new(rt: Runtime, client: MssqlClient) -> Self {
        Self {
            client: Some(client),
            rt,
        }
    }

    fn parts(&mut self) -> Result<(&Runtime, &mut MssqlClient), DataAccessError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| DataAccessError::Connection("SQL Server connection is closed".to_string()))?;
        Ok((&self.rt, client))
    }

    fn control(&mut self, sql: &str) -> Result<(), DataAccessError> {
        let (rt, client) = self.parts()?;
        rt.block_on(simple_batch(client, sql))
    }
}

fn bind(statement: &Statement) -> Result<BoundSql<'_>, DataAccessError> {
    match statement.kind() {
        CommandKind::Text => bind_named(statement.sql(), statement.params(), PlaceholderStyle::Mssql),
        CommandKind::StoredProcedure => {
            procedure_call(statement.sql(), statement.params(), PlaceholderStyle::Mssql)
        }
    }
}

impl BackendConnection for MssqlConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Mssql
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DataAccessError> {
        debug!(?isolation, "sql server begin transaction");
        self.control(&format!(
            "SET TRANSACTION ISOLATION LEVEL {}; BEGIN TRANSACTION",
            isolation.as_sql()
        ))
    }

    fn commit(&mut self) -> Result<(), DataAccessError> {
        self.control("COMMIT TRANSACTION")
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        // XACT_ABORT errors may already have ended the transaction server-side.
        self.control("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet, DataAccessError> {
        let bound = bind(statement)?;
        let (rt, client) = self.parts()?;
        rt.block_on(build_result_set(client, &bound.sql, &bound.values))
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, DataAccessError> {
        let bound = bind(statement)?;
        let (rt, client) = self.parts()?;
        rt.block_on(execute_affected(client, &bound.sql, &bound.values))
    }

    fn scalar(&mut self, statement: &Statement) -> Result<Option<RowValues>, DataAccessError> {
        let bound = bind(statement)?;
        let (rt, client) = self.parts()?;
        rt.block_on(first_value(client, &bound.sql, &bound.values))
    }

    fn close(&mut self) -> Result<(), DataAccessError> {
        if let Some(client) = self.client.take() {
            self.rt.block_on(client.close())?;
        }
        Ok(())
    }
}
