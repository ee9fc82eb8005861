//! Error types for diff computation and shifting.

use recipe_actions::ActionError;
use recipe_types::ColumnId;

/// Why a rewritten step cannot keep one of its column references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The column was created by a step the mutation removes or reshapes.
    Deleted,
    /// The column is created by a step that now comes later.
    NotYetCreated,
    /// The column is absent from the schema at that point.
    Missing,
    /// Shifting the id would leave the column id range.
    OutOfRange,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deleted => write!(f, "is deleted"),
            Self::NotYetCreated => write!(f, "is not created yet"),
            Self::Missing => write!(f, "does not exist"),
            Self::OutOfRange => write!(f, "cannot be renumbered"),
        }
    }
}

/// Errors that can occur while computing or rewriting diffs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiffError {
    /// An action is malformed or targets a column the schema lacks.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// A step after the mutation point would lose one of its columns.
    #[error("step {position} ({action}) uses column {column}, which {reason} at that point")]
    Conflict {
        /// Zero-based index in the rewritten suffix.
        position: usize,
        action: String,
        column: ColumnId,
        reason: ConflictReason,
    },
}

impl DiffError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
