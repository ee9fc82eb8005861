//! Error types for preparation storage and locking.

use thiserror::Error;

use crate::types::PreparationId;

/// Errors that can occur while storing or locking preparations.
#[derive(Debug, Error)]
pub enum RefError {
    /// The preparation was not found.
    #[error("preparation not found: {0}")]
    NotFound(PreparationId),

    /// A preparation with this id already exists.
    #[error("preparation already exists: {0}")]
    AlreadyExists(PreparationId),

    /// The preparation is locked by another owner.
    #[error("preparation {preparation} is locked by {owner}")]
    Locked {
        preparation: PreparationId,
        owner: String,
    },

    /// The backend could not be used (e.g. a poisoned lock).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for preparation operations.
pub type Result<T> = std::result::Result<T, RefError>;
