//! Error types for history mutations.

use std::fmt;

use thiserror::Error;

use recipe_actions::ActionError;
use recipe_chain::{ChainError, StepId};
use recipe_diff::DiffError;
use recipe_refs::{PreparationId, RefError};
use recipe_store::StoreError;
use recipe_types::ColumnId;

/// Coarse classification of a failure, as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidRequest,
    Forbidden,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::InvalidRequest => "invalid request",
            Self::Forbidden => "forbidden",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("preparation not found: {0}")]
    PreparationNotFound(PreparationId),

    #[error("step not found: {0}")]
    StepNotFound(StepId),

    #[error("the root step cannot be deleted")]
    RootStepCannotBeDeleted,

    #[error("the root step cannot be updated or moved")]
    RootStepImmutable,

    #[error("missing action scope: {0}")]
    MissingActionScope(ActionError),

    #[error("invalid action: {0}")]
    InvalidAction(ActionError),

    #[error("action {action} references unknown column {column}")]
    UnknownColumn { action: String, column: ColumnId },

    #[error("a step needs at least one action")]
    EmptyActionList,

    #[error("history would exceed {limit} steps")]
    TooManySteps { limit: usize },

    #[error("conflict: {0}")]
    Conflict(DiffError),

    #[error("preparation {0} already has steps")]
    PreparationNotEmpty(PreparationId),

    #[error("preparation {preparation} is locked by {owner}")]
    Locked {
        preparation: PreparationId,
        owner: String,
    },

    #[error("stored history no longer replays: {0}")]
    InconsistentHistory(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("preparation store error: {0}")]
    Refs(RefError),
}

impl HistoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PreparationNotFound(_) | Self::StepNotFound(_) => ErrorKind::NotFound,
            Self::RootStepCannotBeDeleted | Self::RootStepImmutable => ErrorKind::Forbidden,
            Self::MissingActionScope(_)
            | Self::InvalidAction(_)
            | Self::UnknownColumn { .. }
            | Self::EmptyActionList
            | Self::TooManySteps { .. } => ErrorKind::InvalidRequest,
            Self::Conflict(_) | Self::PreparationNotEmpty(_) | Self::Locked { .. } => {
                ErrorKind::Conflict
            }
            Self::InconsistentHistory(_)
            | Self::Config(_)
            | Self::Chain(_)
            | Self::Store(_)
            | Self::Refs(_) => ErrorKind::Internal,
        }
    }
}

impl From<ActionError> for HistoryError {
    fn from(e: ActionError) -> Self {
        match e {
            ActionError::MissingScope { .. } => Self::MissingActionScope(e),
            ActionError::UnknownColumn { action, column } => Self::UnknownColumn { action, column },
            other => Self::InvalidAction(other),
        }
    }
}

impl From<DiffError> for HistoryError {
    fn from(e: DiffError) -> Self {
        match e {
            DiffError::Action(action) => action.into(),
            conflict @ DiffError::Conflict { .. } => Self::Conflict(conflict),
        }
    }
}

impl From<RefError> for HistoryError {
    fn from(e: RefError) -> Self {
        match e {
            RefError::NotFound(id) => Self::PreparationNotFound(id),
            RefError::Locked { preparation, owner } => Self::Locked { preparation, owner },
            other => Self::Refs(other),
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;
