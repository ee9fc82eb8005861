use recipe_types::ObjectId;

/// Errors from content store operations.
///
/// A missing object is not an error: lookups return `Ok(None)` and callers
/// decide whether absence means a broken chain.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An action list or step record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Stored bytes of the wrong kind, or bytes that do not decode.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    #[error("cannot store object with null ID")]
    NullObjectId,

    /// Backend failure (poisoned lock, exhausted quota, lost connection).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
