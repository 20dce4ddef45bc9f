use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tokio_postgres::Client;

use super::query::{build_result_set, execute_affected, first_value};
use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::RowSet;
use crate::translation::{BoundSql, PlaceholderStyle, bind_named, procedure_call};
use crate::types::{CommandKind, DatabaseType, IsolationLevel, RowValues};

/// An open Postgres connection, its runtime and its background I/O task.
///
/// Postgres aborts the whole transaction when one of its statements fails and
/// then answers `COMMIT` with a rollback. The connection remembers that state
/// so `commit` can report it instead of succeeding silently.
pub struct PostgresConnection {
    client: Option<Client>,
    task: Option<JoinHandle<()>>,
    in_transaction: bool,
    aborted: bool,
    rt: Runtime,
}

impl PostgresConnection {
    pub(crate) fn new(rt: Runtime, client: Client, task: JoinHandle<()>) -> Self {
        Self {
            client: Some(client),
            task: Some(task),
            in_transaction: false,
            aborted: false,
            rt,
        }
    }

    fn client(&self) -> Result<&Client, DataAccessError> {
        self.client
            .as_ref()
            .ok_or_else(|| DataAccessError::Connection("Postgres connection is closed".to_string()))
    }

    fn batch_execute(&self, sql: &str) -> Result<(), DataAccessError> {
        let client = self.client()?;
        self.rt.block_on(client.batch_execute(sql))?;
        Ok(())
    }

    /// Record a server-side failure inside an open transaction.
    fn track<T>(&mut self, result: Result<T, DataAccessError>) -> Result<T, DataAccessError> {
        if self.in_transaction
            && let Err(DataAccessError::Postgres(e)) = &result
            && e.as_db_error().is_some()
        {
            self.aborted = true;
        }
        result
    }
}

fn bind(statement: &Statement) -> Result<BoundSql<'_>, DataAccessError> {
    match statement.kind() {
        CommandKind::Text => bind_named(statement.sql(), statement.params(), PlaceholderStyle::Postgres),
        CommandKind::StoredProcedure => {
            procedure_call(statement.sql(), statement.params(), PlaceholderStyle::Postgres)
        }
    }
}

impl BackendConnection for PostgresConnection {
    fn database_type(&self) -> DatabaseType {
        DatabaseType::Postgres
    }

    fn begin(&mut self, isolation: IsolationLevel) -> Result<(), DataAccessError> {
        self.batch_execute(&format!("BEGIN ISOLATION LEVEL {}", isolation.as_sql()))?;
        self.in_transaction = true;
        self.aborted = false;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DataAccessError> {
        if self.aborted {
            self.rollback()?;
            return Err(DataAccessError::Execution(
                "transaction was aborted by a failed statement and has been rolled back".to_string(),
            ));
        }
        self.batch_execute("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DataAccessError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.batch_execute("ROLLBACK")?;
        self.in_transaction = false;
        self.aborted = false;
        Ok(())
    }

    fn query(&mut self, statement: &Statement) -> Result<RowSet, DataAccessError> {
        let bound = bind(statement)?;
        let client = self.client()?;
        let result = self.rt.block_on(build_result_set(client, &bound.sql, &bound.values));
        self.track(result)
    }

    fn execute(&mut self, statement: &Statement) -> Result<u64, DataAccessError> {
        let bound = bind(statement)?;
        let client = self.client()?;
        let result = self.rt.block_on(execute_affected(client, &bound.sql, &bound.values));
        self.track(result)
    }

    fn scalar(&mut self, statement: &Statement) -> Result<Option<RowValues>, DataAccessError> {
        let bound = bind(statement)?;
        let client = self.client()?;
        let result = self.rt.block_on(first_value(client, &bound.sql, &bound.values));
        self.track(result)
    }

    fn close(&mut self) -> Result<(), DataAccessError> {
        // Dropping the client ends the connection task once it drains.
        drop(self.client.take());
        if let Some(task) = self.task.take() {
            self.rt
                .block_on(task)
                .map_err(|e| DataAccessError::Connection(format!("Postgres connection task failed: {e}")))?;
        }
        Ok(())
    }
}
