//! Error types for step chains.

use recipe_store::StoreError;

use crate::step::StepId;

/// Errors that can occur while reading or writing step chains.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The requested step is not in the store.
    #[error("step not found: {0}")]
    StepNotFound(StepId),

    /// A stored step could not be decoded.
    #[error("corrupt step {id}: {reason}")]
    CorruptStep { id: StepId, reason: String },

    /// Serialization failure while encoding a step.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for chain results.
pub type ChainResult<T> = Result<T, ChainError>;
