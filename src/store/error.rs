//! Storage error taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by any storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A write would duplicate a natural key guarded by `constraint`.
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: &'static str },

    /// The call did not finish within its deadline.
    #[error("storage call timed out after {0:?}")]
    Timeout(Duration),

    /// Anything else the backend reports.
    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
