//! Single-statement execution with sentinel results.
//!
//! Every function here swallows faults: the error is logged through
//! `tracing` and the operation's sentinel comes back instead (an empty
//! `RowSet`, `false`, `-1` or `None`). The local-transaction rule is the
//! same for all of them except `select_one`: on a bare connection the
//! statement runs inside a read-committed transaction the function opens and
//! resolves itself, while a borrowed [`Tx`](crate::transaction::Tx) is used
//! as-is and left to its owner.

mod targets;

pub use targets::ExecTarget;

use std::borrow::Cow;

use tracing::{error, warn};

use crate::backend::BackendConnection;
use crate::error::DataAccessError;
use crate::params::Statement;
use crate::results::{FAILURE, RowSet};
use crate::transaction::Tx;
use crate::types::{CommandKind, DatabaseType, IsolationLevel, RowValues};

pub(crate) fn log_failure(database: DatabaseType, operation: &str, sql: &str, e: &DataAccessError) {
    error!(%database, operation, sql, error = %e, "statement failed");
}

/// Run `f` in the target's transaction, opening and resolving a local one
/// when the target is a bare connection.
fn in_transaction<C, T>(
    target: ExecTarget<'_, '_, C>,
    statement: &Statement,
    f: impl FnOnce(&mut C, &Statement) -> Result<T, DataAccessError>,
) -> Result<T, DataAccessError>
where
    C: BackendConnection,
{
    match target {
        ExecTarget::Transaction(tx) => f(tx.connection(), statement),
        ExecTarget::Connection(conn) => {
            let mut tx = Tx::begin(conn, IsolationLevel::ReadCommitted)?;
            match f(tx.connection(), statement) {
                Ok(value) => {
                    tx.commit()?;
                    Ok(value)
                }
                Err(e) => {
                    let database = tx.database_type();
                    if let Err(rollback_err) = tx.rollback() {
                        warn!(%database, error = %rollback_err, "rollback after failed statement failed");
                    }
                    Err(e)
                }
            }
        }
    }
}

fn count_to_i64(count: u64) -> Result<i64, DataAccessError> {
    i64::try_from(count)
        .map_err(|_| DataAccessError::Execution(format!("affected-row count {count} overflows i64")))
}

/// Run a read query and materialise every row.
///
/// Never opens a transaction. Returns an empty `RowSet` on any fault, so a
/// failed query and a query with no rows look the same.
pub fn select_one<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> RowSet {
    let target = target.into();
    let database = target.database_type();
    let result = match target {
        ExecTarget::Connection(conn) => conn.query(statement),
        ExecTarget::Transaction(tx) => tx.connection().query(statement),
    };
    result.unwrap_or_else(|e| {
        log_failure(database, "select_one", statement.sql(), &e);
        RowSet::default()
    })
}

/// Run a statement for its side effect; `true` iff at least one row was affected.
pub fn insert_one<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> bool {
    let target = target.into();
    let database = target.database_type();
    match in_transaction(target, statement, |conn, stmt| conn.execute(stmt)) {
        Ok(count) => count > 0,
        Err(e) => {
            log_failure(database, "insert_one", statement.sql(), &e);
            false
        }
    }
}

fn affected<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: ExecTarget<'a, 'c, C>,
    statement: &Statement,
    operation: &str,
) -> i64 {
    let database = target.database_type();
    let result = in_transaction(target, statement, |conn, stmt| conn.execute(stmt))
        .and_then(count_to_i64);
    result.unwrap_or_else(|e| {
        log_failure(database, operation, statement.sql(), &e);
        FAILURE
    })
}

/// Affected-row count, `0` when nothing matched, [`FAILURE`] on a fault.
pub fn update_one<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> i64 {
    affected(target.into(), statement, "update_one")
}

/// Affected-row count, `0` when nothing matched, [`FAILURE`] on a fault.
pub fn delete_one<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> i64 {
    affected(target.into(), statement, "delete_one")
}

/// First column of the first row.
///
/// `None` when no row came back or on a fault. A database NULL in that cell
/// is `Some(RowValues::Null)`.
pub fn scalar_one<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> Option<RowValues> {
    let target = target.into();
    let database = target.database_type();
    in_transaction(target, statement, |conn, stmt| conn.scalar(stmt)).unwrap_or_else(|e| {
        log_failure(database, "scalar_one", statement.sql(), &e);
        None
    })
}

/// Call a stored procedure; the statement text is the procedure name.
///
/// A `Text` statement is re-tagged as a procedure call, so the same
/// `Statement` built for a query can name a procedure.
pub fn stored_proc<'a, 'c: 'a, C: BackendConnection + 'c>(
    target: impl Into<ExecTarget<'a, 'c, C>>,
    statement: &Statement,
) -> i64 {
    let statement = match statement.kind() {
        CommandKind::StoredProcedure => Cow::Borrowed(statement),
        CommandKind::Text => Cow::Owned(
            Statement::procedure(statement.sql()).with_params(statement.params().cloned()),
        ),
    };
    affected(target.into(), &statement, "stored_proc")
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::params::Params;
    use crate::sqlite::{SqliteBackend, SqliteConnection, SqliteOptions};

    fn open() -> Result<(tempfile::TempDir, SqliteConnection), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let backend = SqliteBackend::new(SqliteOptions::new(
            dir.path().join("exec.db").to_string_lossy().into_owned(),
        ));
        let mut conn = backend.connect()?;
        conn.execute(&Statement::text(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        ))?;
        Ok((dir, conn))
    }

    fn count(conn: &mut SqliteConnection) -> Option<i64> {
        scalar_one(conn, &Statement::text("SELECT COUNT(*) FROM items"))
            .and_then(|v| v.as_int().copied())
    }

    #[test]
    fn sentinels_on_success_and_failure() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        let insert = Statement::text("INSERT INTO items (id, name) VALUES (@id, @name)")
            .with_params(Some(Params::new().with("id", 1).with("name", "a")));
        assert!(insert_one(&mut conn, &insert));
        // duplicate key
        assert!(!insert_one(&mut conn, &insert));

        let update = Statement::text("UPDATE items SET name = 'b' WHERE id = :id")
            .with_params(Some(Params::new().with("id", 9)));
        assert_eq!(update_one(&mut conn, &update), 0);
        assert_eq!(
            delete_one(&mut conn, &Statement::text("DELETE FROM missing_table")),
            FAILURE
        );
        assert!(select_one(&mut conn, &Statement::text("SELECT * FROM missing_table")).is_empty());
        assert_eq!(count(&mut conn), Some(1));
        Ok(())
    }

    #[test]
    fn scalar_null_cell_differs_from_no_row() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        assert_eq!(scalar_one(&mut conn, &Statement::text("SELECT NULL")), Some(RowValues::Null));
        assert_eq!(
            scalar_one(&mut conn, &Statement::text("SELECT name FROM items WHERE id = 42")),
            None
        );
        Ok(())
    }

    #[test]
    fn scalar_takes_the_first_row_of_many() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
            let insert = Statement::text("INSERT INTO items (id, name) VALUES (:id, :name)")
                .with_params(Some(Params::new().with("id", id).with("name", name)));
            assert!(insert_one(&mut conn, &insert));
        }
        assert_eq!(
            scalar_one(&mut conn, &Statement::text("SELECT name FROM items ORDER BY id")),
            Some(RowValues::Text("a".into()))
        );
        // no result columns: the statement still runs
        assert_eq!(scalar_one(&mut conn, &Statement::text("DELETE FROM items WHERE id = 3")), None);
        assert_eq!(count(&mut conn), Some(2));
        Ok(())
    }

    #[test]
    fn unknown_parameter_name_fails_the_statement() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        let insert = Statement::text("INSERT INTO items (id, name) VALUES (1, 'x')")
            .with_params(Some(Params::new().with("nope", 1)));
        assert!(!insert_one(&mut conn, &insert));
        assert_eq!(count(&mut conn), Some(0));
        Ok(())
    }

    #[test]
    fn caller_transaction_is_left_open() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        {
            let mut tx = Tx::begin(&mut conn, IsolationLevel::ReadCommitted)?;
            let insert = Statement::text("INSERT INTO items (id, name) VALUES (5, 'e')");
            assert!(insert_one(&mut tx, &insert));
            assert_eq!(select_one(&mut tx, &Statement::text("SELECT id FROM items")).len(), 1);
            tx.rollback()?;
        }
        assert_eq!(count(&mut conn), Some(0));
        Ok(())
    }

    #[test]
    fn stored_procedures_are_unsupported_on_sqlite() -> Result<(), Box<dyn std::error::Error>> {
        let (_dir, mut conn) = open()?;
        assert_eq!(stored_proc(&mut conn, &Statement::procedure("usp_anything")), FAILURE);
        Ok(())
    }
}
