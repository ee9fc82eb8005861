//! Error types for action resolution and parameter typing.

use recipe_types::{ColumnId, TypeError};

/// Errors raised while typing parameters or computing column effects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    /// The action does not say what it applies to, or names a scope without
    /// the parameter that scope needs (e.g. `column` scope without
    /// `column_id`).
    #[error("action {action} has no usable scope: {reason}")]
    MissingScope { action: String, reason: String },

    /// A required parameter is absent.
    #[error("action {action} is missing parameter {parameter}")]
    MissingParameter { action: String, parameter: String },

    /// A parameter value does not match its declared kind.
    #[error("action {action}: invalid value for {parameter}: {reason}")]
    InvalidParameter {
        action: String,
        parameter: String,
        reason: String,
    },

    /// The action targets a column absent from the schema it is applied to.
    #[error("action {action} targets unknown column {column}")]
    UnknownColumn { action: String, column: ColumnId },

    /// The action creates a column but the schema has no column id left.
    #[error("action {action} cannot allocate a column: {source}")]
    ColumnAllocation {
        action: String,
        #[source]
        source: TypeError,
    },
}

/// Convenience alias for action results.
pub type ActionResult<T> = Result<T, ActionError>;
