//! Core preparation types.

use std::fmt;

use serde::{Deserialize, Serialize};

use recipe_chain::{StepId, ROOT_STEP};
use recipe_types::RowMetadata;

/// Identifier of a preparation.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreparationId(String);

impl PreparationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh time-ordered id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PreparationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PreparationId({})", self.0)
    }
}

impl fmt::Display for PreparationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PreparationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What a client supplies to create a preparation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPreparation {
    pub dataset_id: String,
    pub name: String,
    pub author: String,
    /// Schema of the dataset the recipe applies to.
    #[serde(default)]
    pub row_metadata: RowMetadata,
}

/// A named pointer to the head of a step chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preparation {
    pub id: PreparationId,
    pub dataset_id: String,
    pub name: String,
    /// Current head step.
    pub head_id: StepId,
    /// Schema before any step applies.
    pub row_metadata: RowMetadata,
    /// Epoch milliseconds.
    pub creation_date: i64,
    /// Epoch milliseconds; strictly increases on every head change.
    pub last_modification_date: i64,
    pub author: String,
    pub app_version: String,
}

impl Preparation {
    /// A preparation with an empty history.
    pub fn new(id: PreparationId, request: NewPreparation, app_version: &str, now: i64) -> Self {
        Self {
            id,
            dataset_id: request.dataset_id,
            name: request.name,
            head_id: ROOT_STEP.id(),
            row_metadata: request.row_metadata,
            creation_date: now,
            last_modification_date: now,
            author: request.author,
            app_version: app_version.to_string(),
        }
    }

    /// `true` once at least one step has been applied.
    pub fn has_steps(&self) -> bool {
        self.head_id != ROOT_STEP.id()
    }

    /// Point at `head`. Returns `false`, touching nothing, if it already does.
    pub fn move_head(&mut self, head: StepId, now: i64) -> bool {
        if self.head_id == head {
            return false;
        }
        self.head_id = head;
        self.touch(now);
        true
    }

    /// Advance the modification date, never backwards and never in place.
    pub fn touch(&mut self, now: i64) {
        self.last_modification_date = now.max(self.last_modification_date.saturating_add(1));
    }
}
