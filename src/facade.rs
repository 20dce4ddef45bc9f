//! The public entry point: one method per operation and store.
//!
//! Every method opens exactly the connections it needs, runs the operation
//! and closes them again before returning. Backend faults never cross this
//! boundary; they come back as the operation's sentinel. The only error a
//! caller can receive is a validation error from a batch whose statement and
//! parameter lists disagree, raised before any connection is opened.

use tracing::error;

use crate::backend::{AnyBackend, Backend};
use crate::batch::run_batch;
use crate::config::{ConfigSources, ConnectionSettings, resolve};
use crate::error::DataAccessError;
use crate::executor::{self, log_failure};
use crate::mixed;
use crate::params::{Batch, Params, Statement};
use crate::results::{ExecutionResult, FAILURE, RowSet, TaggedResult};
use crate::scope::ConnectionScope;
use crate::types::{DatabaseType, RowValues, Store};

/// One operation for [`DataAccessLayer::execute`].
#[derive(Debug, Clone)]
pub enum Request {
    Select(Statement),
    Insert(Statement),
    Update(Statement),
    Delete(Statement),
    Scalar(Statement),
    /// The statement text is the procedure name.
    StoredProc(Statement),
    Batch(Batch),
}

/// Data-access layer over a primary and a secondary store.
#[derive(Debug, Clone)]
pub struct DataAccessLayer<P: Backend = AnyBackend, S: Backend = AnyBackend> {
    primary: P,
    secondary: S,
    settings: Option<ConnectionSettings>,
}

impl<P: Backend, S: Backend> DataAccessLayer<P, S> {
    #[must_use]
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            settings: None,
        }
    }

    /// The settings this layer was built from, if it was built from settings.
    #[must_use]
    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_ref()
    }

    #[must_use]
    pub fn primary_backend(&self) -> &P {
        &self.primary
    }

    #[must_use]
    pub fn secondary_backend(&self) -> &S {
        &self.secondary
    }

    #[must_use]
    pub fn primary(&self) -> StoreHandle<'_, P> {
        StoreHandle::new(&self.primary, Store::Primary)
    }

    #[must_use]
    pub fn secondary(&self) -> StoreHandle<'_, S> {
        StoreHandle::new(&self.secondary, Store::Secondary)
    }

    /// Run a batch on each store in one call, committing the secondary first
    /// and the primary second.
    ///
    /// Returns the summed affected-row count of both stores, or `-1` on any
    /// failure. This is not atomic across stores: if the primary commit fails
    /// after the secondary commit succeeded, the secondary's changes remain.
    /// See [`crate::mixed`].
    ///
    /// # Errors
    /// Returns `DataAccessError::Validation`, before opening any connection,
    /// when either store's statement and parameter lists disagree in length.
    pub fn run_mixed(
        &self,
        primary_queries: Option<Vec<String>>,
        primary_params: Option<Vec<Params>>,
        secondary_queries: Option<Vec<String>>,
        secondary_params: Option<Vec<Params>>,
    ) -> Result<i64, DataAccessError> {
        let primary_batch = mixed::side_batch(primary_queries, primary_params)?;
        let secondary_batch = mixed::side_batch(secondary_queries, secondary_params)?;

        let mut secondary = match ConnectionScope::open(&self.secondary) {
            Ok(scope) => scope,
            Err(e) => {
                error!(database = %self.secondary.database_type(), error = %e, "run_mixed: cannot open secondary");
                return Ok(FAILURE);
            }
        };
        let mut primary = match ConnectionScope::open(&self.primary) {
            Ok(scope) => scope,
            Err(e) => {
                error!(database = %self.primary.database_type(), error = %e, "run_mixed: cannot open primary");
                return Ok(FAILURE);
            }
        };

        Ok(mixed::run_mixed(
            primary.connection(),
            secondary.connection(),
            primary_batch.as_ref(),
            secondary_batch.as_ref(),
        ))
    }
}

impl DataAccessLayer<AnyBackend, AnyBackend> {
    /// Build both engines from resolved settings. Nothing is opened yet.
    ///
    /// # Errors
    /// Returns `DataAccessError::Config` or `Unsupported` when a store's
    /// connection string cannot be parsed or its engine is not compiled in.
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self, DataAccessError> {
        Ok(Self {
            primary: AnyBackend::from_settings(&settings.primary)?,
            secondary: AnyBackend::from_settings(&settings.secondary)?,
            settings: Some(settings.clone()),
        })
    }

    /// Resolve settings from `sources` once and build both engines.
    ///
    /// # Errors
    /// As for [`DataAccessLayer::from_settings`].
    pub fn from_sources(sources: &ConfigSources) -> Result<Self, DataAccessError> {
        Self::from_settings(&resolve(sources))
    }
}

impl<B: Backend> DataAccessLayer<B, B> {
    /// Pick a store at runtime.
    #[must_use]
    pub fn store(&self, store: Store) -> StoreHandle<'_, B> {
        match store {
            Store::Primary => self.primary(),
            Store::Secondary => self.secondary(),
        }
    }

    /// Run one request against `store` and tag the result with where it ran.
    #[must_use]
    pub fn execute(&self, store: Store, request: Request) -> TaggedResult {
        let handle = self.store(store);
        let result = match request {
            Request::Select(stmt) => ExecutionResult::Rows(handle.select(&stmt)),
            Request::Insert(stmt) => ExecutionResult::Success(handle.insert(&stmt)),
            Request::Update(stmt) => ExecutionResult::Affected(handle.update(&stmt)),
            Request::Delete(stmt) => ExecutionResult::Affected(handle.delete(&stmt)),
            Request::Scalar(stmt) => ExecutionResult::Scalar(handle.scalar(&stmt)),
            Request::StoredProc(stmt) => ExecutionResult::Affected(handle.procedure(&stmt)),
            Request::Batch(batch) => ExecutionResult::Affected(handle.batch(&batch)),
        };
        TaggedResult {
            store,
            database_type: handle.database_type(),
            result,
        }
    }
}

/// The operations of one store. Each call opens and closes its own connection.
#[derive(Debug)]
pub struct StoreHandle<'a, B: Backend> {
    backend: &'a B,
    store: Store,
}

impl<'a, B: Backend> StoreHandle<'a, B> {
    fn new(backend: &'a B, store: Store) -> Self {
        Self { backend, store }
    }

    #[must_use]
    pub fn store(&self) -> Store {
        self.store
    }

    #[must_use]
    pub fn database_type(&self) -> DatabaseType {
        self.backend.database_type()
    }

    fn scoped<T>(
        &self,
        operation: &str,
        sql: &str,
        failure: T,
        f: impl FnOnce(&mut B::Connection) -> T,
    ) -> T {
        match ConnectionScope::open(self.backend) {
            Ok(mut scope) => f(scope.connection()),
            Err(e) => {
                log_failure(self.database_type(), operation, sql, &e);
                failure
            }
        }
    }

    /// All rows of a read query; empty on any failure.
    #[must_use]
    pub fn select_one(&self, sql: &str, params: Option<Params>) -> RowSet {
        self.select(&Statement::text(sql).with_params(params))
    }

    /// `true` iff at least one row was affected.
    #[must_use]
    pub fn insert_one(&self, sql: &str, params: Option<Params>) -> bool {
        self.insert(&Statement::text(sql).with_params(params))
    }

    /// Affected rows, or `-1` on failure.
    #[must_use]
    pub fn update_one(&self, sql: &str, params: Option<Params>) -> i64 {
        self.update(&Statement::text(sql).with_params(params))
    }

    /// Affected rows, or `-1` on failure.
    #[must_use]
    pub fn delete_one(&self, sql: &str, params: Option<Params>) -> i64 {
        self.delete(&Statement::text(sql).with_params(params))
    }

    /// First cell of the first row; `None` when there is no row or on failure.
    #[must_use]
    pub fn scalar_one(&self, sql: &str, params: Option<Params>) -> Option<RowValues> {
        self.scalar(&Statement::text(sql).with_params(params))
    }

    /// Affected rows reported by the procedure, or `-1` on failure.
    #[must_use]
    pub fn stored_proc(&self, name: &str, params: Option<Params>) -> i64 {
        self.procedure(&Statement::procedure(name).with_params(params))
    }

    /// Run `queries` as one all-or-nothing transaction.
    ///
    /// Returns the summed affected-row count, or `Ok(-1)` when anything
    /// failed and the transaction was rolled back.
    ///
    /// # Errors
    /// Returns `DataAccessError::Validation`, before opening a connection, for
    /// an empty statement list or a parameter list of a different length.
    pub fn run_batch<Q: Into<String>>(
        &self,
        queries: impl IntoIterator<Item = Q>,
        params_list: Option<Vec<Params>>,
    ) -> Result<i64, DataAccessError> {
        let batch = Batch::new(queries, params_list)?;
        Ok(self.batch(&batch))
    }

    #[must_use]
    pub fn select(&self, stmt: &Statement) -> RowSet {
        self.scoped("select_one", stmt.sql(), RowSet::default(), |conn| {
            executor::select_one(conn, stmt)
        })
    }

    #[must_use]
    pub fn insert(&self, stmt: &Statement) -> bool {
        self.scoped("insert_one", stmt.sql(), false, |conn| executor::insert_one(conn, stmt))
    }

    #[must_use]
    pub fn update(&self, stmt: &Statement) -> i64 {
        self.scoped("update_one", stmt.sql(), FAILURE, |conn| executor::update_one(conn, stmt))
    }

    #[must_use]
    pub fn delete(&self, stmt: &Statement) -> i64 {
        self.scoped("delete_one", stmt.sql(), FAILURE, |conn| executor::delete_one(conn, stmt))
    }

    #[must_use]
    pub fn scalar(&self, stmt: &Statement) -> Option<RowValues> {
        self.scoped("scalar_one", stmt.sql(), None, |conn| executor::scalar_one(conn, stmt))
    }

    #[must_use]
    pub fn procedure(&self, stmt: &Statement) -> i64 {
        self.scoped("stored_proc", stmt.sql(), FAILURE, |conn| executor::stored_proc(conn, stmt))
    }

    #[must_use]
    pub fn batch(&self, batch: &Batch) -> i64 {
        let first_sql = batch.statements().first().map_or("", Statement::sql);
        self.scoped("run_batch", first_sql, FAILURE, |conn| run_batch(conn, batch))
    }
}
