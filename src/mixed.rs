//! Best-effort execution spanning both stores in one call.
//!
//! Each store gets its own local read-committed transaction and the two are
//! committed one after the other: secondary first, then primary. There is no
//! two-phase commit. If the secondary commit succeeds and the primary commit
//! then fails, the secondary's changes stay committed while the primary's are
//! rolled back, and nothing compensates. The caller sees the same `-1` as for
//! any other failure; the divergence is only visible in the `error` log.

use tracing::error;

use crate::backend::BackendConnection;
use crate::batch::execute_in;
use crate::error::DataAccessError;
use crate::params::{Batch, Params};
use crate::results::FAILURE;
use crate::transaction::Tx;
use crate::types::IsolationLevel;

/// Validate one store's half of a mixed call.
///
/// No statements (absent or empty) means nothing runs on that store; a
/// parameter list is then only accepted if it is empty too. Otherwise the
/// rules of [`Batch::new`] apply.
///
/// # Errors
/// Returns `DataAccessError::Validation` on a statement/parameter length mismatch.
pub fn side_batch(
    queries: Option<Vec<String>>,
    params_list: Option<Vec<Params>>,
) -> Result<Option<Batch>, DataAccessError> {
    let queries = queries.unwrap_or_default();
    if queries.is_empty() {
        return match params_list {
            Some(params) if !params.is_empty() => Err(DataAccessError::Validation(format!(
                "parameter list has {} entries but no statements were supplied",
                params.len()
            ))),
            _ => Ok(None),
        };
    }
    Batch::new(queries, params_list).map(Some)
}

/// Run `secondary_batch` then `primary_batch`, each in its own transaction,
/// and commit secondary before primary.
///
/// Returns the summed affected-row count of both stores on full success and
/// [`FAILURE`] otherwise. Every transaction still open when a fault occurs is
/// rolled back; see the module docs for the one case that cannot be undone.
pub fn run_mixed<P, S>(
    primary: &mut P,
    secondary: &mut S,
    primary_batch: Option<&Batch>,
    secondary_batch: Option<&Batch>,
) -> i64
where
    P: BackendConnection,
    S: BackendConnection,
{
    match try_run_mixed(primary, secondary, primary_batch, secondary_batch) {
        Ok(total) => total,
        Err(e) => {
            error!(error = %e, "mixed execution failed");
            FAILURE
        }
    }
}

fn try_run_mixed<P, S>(
    primary: &mut P,
    secondary: &mut S,
    primary_batch: Option<&Batch>,
    secondary_batch: Option<&Batch>,
) -> Result<i64, DataAccessError>
where
    P: BackendConnection,
    S: BackendConnection,
{
    // Open transactions roll back as they drop on every early return below.
    let mut secondary_tx = Tx::begin(secondary, IsolationLevel::ReadCommitted)?;
    let mut primary_tx = Tx::begin(primary, IsolationLevel::ReadCommitted)?;

    let mut total: u64 = 0;
    if let Some(batch) = secondary_batch {
        total = total.saturating_add(execute_in(&mut secondary_tx, batch)?);
    }
    if let Some(batch) = primary_batch {
        total = total.saturating_add(execute_in(&mut primary_tx, batch)?);
    }

    let secondary_db = secondary_tx.database_type();
    let primary_db = primary_tx.database_type();
    secondary_tx.commit()?;
    if let Err(e) = primary_tx.commit() {
        error!(
            primary = %primary_db,
            secondary = %secondary_db,
            error = %e,
            "secondary committed, primary rolled back: stores have diverged"
        );
        return Err(e);
    }

    i64::try_from(total)
        .map_err(|_| DataAccessError::Execution(format!("affected-row count {total} overflows i64")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_or_absent_side_runs_nothing() -> Result<(), Box<dyn std::error::Error>> {
        assert!(side_batch(None, None)?.is_none());
        assert!(side_batch(Some(Vec::new()), Some(Vec::new()))?.is_none());
        Ok(())
    }

    #[test]
    fn mismatched_side_is_a_validation_error() {
        let err = side_batch(None, Some(vec![Params::new()])).unwrap_err();
        assert!(err.is_validation());

        let err = side_batch(
            Some(vec!["DELETE FROM a".to_string(), "DELETE FROM b".to_string()]),
            Some(vec![Params::new()]),
        )
        .unwrap_err();
        assert!(err.is_validation());
    }
}
