mod row;
mod row_set;

pub use row::Row;
pub use row_set::RowSet;

use crate::types::{DatabaseType, RowValues, Store};

/// Sentinel returned by count-producing operations when anything failed.
pub const FAILURE: i64 = -1;

/// What a single operation produced. Never partially populated: a failure
/// is expressed by the variant's own sentinel.
#[derive(Debug, Clone)]
pub enum ExecutionResult {
    /// Select: materialised rows (empty on failure)
    Rows(RowSet),
    /// Insert: true iff at least one row was affected
    Success(bool),
    /// Update/delete/procedure/batch: affected rows, or [`FAILURE`]
    Affected(i64),
    /// Scalar: first cell of the first row, `None` on no row or failure
    Scalar(Option<RowValues>),
}

impl ExecutionResult {
    /// Whether the value is one of the failure sentinels.
    ///
    /// An empty row set and a `None` scalar are reported as failures even
    /// though they are also what a successful, empty query yields.
    #[must_use]
    pub fn is_failure_sentinel(&self) -> bool {
        match self {
            ExecutionResult::Rows(rows) => rows.is_empty(),
            ExecutionResult::Success(ok) => !ok,
            ExecutionResult::Affected(n) => *n == FAILURE,
            ExecutionResult::Scalar(value) => value.is_none(),
        }
    }
}

/// An [`ExecutionResult`] tagged with the store and engine that produced it.
#[derive(Debug, Clone)]
pub struct TaggedResult {
    pub store: Store,
    pub database_type: DatabaseType,
    pub result: ExecutionResult,
}
