//! All-or-nothing execution of a [`Batch`] against one store.

use tracing::{debug, warn};

use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::executor::log_failure;
use crate::params::Batch;
use crate::results::FAILURE;
use crate::transaction::Tx;
use crate::types::IsolationLevel;

/// Execute every statement of `batch`, in order, inside `tx`.
///
/// Stops at the first fault and returns it; the caller decides what happens
/// to the transaction.
///
/// # Errors
/// Returns the first statement's `DataAccessError`, with that statement's SQL
/// already logged.
pub fn execute_in<C: BackendConnection>(
    tx: &mut Tx<'_, C>,
    batch: &Batch,
) -> Result<u64, DataAccessError> {
    let database = tx.database_type();
    let mut total: u64 = 0;
    for (position, statement) in batch.statements().iter().enumerate() {
        let affected = tx.connection().execute(statement).inspect_err(|e| {
            log_failure(database, "run_batch", statement.sql(), e);
            debug!(%database, position, "batch stopped");
        })?;
        total = total.saturating_add(affected);
    }
    Ok(total)
}

/// Run `batch` in one read-committed transaction on `conn`.
///
/// Returns the summed affected-row count when every statement succeeds and
/// the commit goes through. On any fault the whole transaction is rolled back
/// and [`FAILURE`] is returned; which statement failed is only logged.
pub fn run_batch<C: BackendConnection>(conn: &mut C, batch: &Batch) -> i64 {
    let database = conn.database_type();
    match try_run_batch(conn, batch) {
        Ok(total) => total,
        Err(e) => {
            warn!(%database, statements = batch.len(), error = %e, "batch rolled back");
            FAILURE
        }
    }
}

fn try_run_batch<C: BackendConnection>(conn: &mut C, batch: &Batch) -> Result<i64, DataAccessError> {
    let mut tx = Tx::begin(conn, IsolationLevel::ReadCommitted)?;
    let total = match execute_in(&mut tx, batch) {
        Ok(total) => total,
        Err(e) => {
            tx.rollback()?;
            return Err(e);
        }
    };
    tx.commit()?;
    i64::try_from(total)
        .map_err(|_| DataAccessError::Execution(format!("affected-row count {total} overflows i64")))
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::params::{Params, Statement};
    use crate::sqlite::{SqliteBackend, SqliteConnection, SqliteOptions};

    fn open() -> Result<(tempfile::TempDir, SqliteConnection), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let backend = SqliteBackend::new(SqliteOptions::new(
            dir.path().join("batch.db").to_string_lossy().into_owned(),
        ));
        let mut conn = backend.connect()?;
        conn.execute(&Statement::text("CREATE TABLE t (x INTEGER NOT NULL)"))?;
        Ok((dir, conn))
    }

    fn rows(conn: &mut SqliteConnection) -> Result<usize, Box<dyn std::error::Error>> {
        Ok(conn.query(&Statement::text("SELECT x FROM t"))?.len())
    }

    #[test]
    fn counts_are_summed_across_statements() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        let batch = Batch::new(
            ["INSERT INTO t (x) VALUES (:v)", "INSERT INTO t (x) VALUES (:v)", "UPDATE t SET x = 0"],
            Some(vec![
                Params::new().with("v", 1),
                Params::new().with("v", 2),
                Params::new(),
            ]),
        )?;
        assert_eq!(run_batch(&mut conn, &batch), 4);
        assert_eq!(rows(&mut conn)?, 2);
        Ok(())
    }

    #[test]
    fn a_failing_statement_discards_earlier_ones() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        let batch = Batch::new(
            [
                "INSERT INTO t (x) VALUES (1)",
                "INSERT INTO t (x) VALUES (NULL)",
                "INSERT INTO t (x) VALUES (3)",
            ],
            None,
        )?;
        assert_eq!(run_batch(&mut conn, &batch), FAILURE);
        assert_eq!(rows(&mut conn)?, 0);
        Ok(())
    }
}
