#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Error taxonomy for the solver core and the set store.
//!
//! A duplicate hash observed while inserting into the store is deliberately
//! *not* part of this taxonomy: concurrent workers rediscovering the same
//! canonical form is the expected, countable outcome of structural sharing
//! and is reported through `store::InsertOutcome::AlreadyExists` instead.

use thiserror::Error;

/// Errors surfaced by the solver core.
#[derive(Debug, Error)]
pub enum SolverError {
    /// Unparsable input, or a DIMACS header whose declared counts disagree
    /// with the clauses that follow. Fatal before any solving starts.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// `canonicalize` failed to reach a fixed point within its iteration
    /// bound. Renaming strictly shrinks the reachable id space, so this is a
    /// contract violation, never an expected outcome.
    #[error("canonicalization did not converge after {iterations} iterations")]
    CanonicalizationDivergence { iterations: usize },

    /// An operation that requires canonical input was handed a non-canonical
    /// node, or a node violating the clauses-xor-value invariant.
    #[error("precondition violated: {0}")]
    PreconditionViolation(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors crossing the store boundary. Raw backend errors never leak past
/// this type.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connectivity or transaction failure. The run degrades or aborts per
    /// configuration; counters are never partially updated.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Point lookup for a hash that is not in the store.
    #[error("hash not found in store: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_into_solver_error() {
        let err: SolverError = StoreError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, SolverError::Store(StoreError::Unavailable(_))));
    }

    #[test]
    fn test_display_names_the_iteration_bound() {
        let err = SolverError::CanonicalizationDivergence { iterations: 12 };
        assert!(err.to_string().contains("12"));
    }
}
