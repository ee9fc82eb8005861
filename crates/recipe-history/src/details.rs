use serde::Serialize;

use recipe_chain::{StepDiff, StepId};
use recipe_refs::PreparationId;
use recipe_types::{Action, RowMetadata};

/// One step as reported by [`PreparationDetails`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepDetails {
    pub id: StepId,
    pub parent: Option<StepId>,
    pub diff: StepDiff,
    pub actions: Vec<Action>,
}

/// A preparation's history from the root up to one step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PreparationDetails {
    pub preparation_id: PreparationId,
    /// Current head of the preparation.
    pub head_id: StepId,
    /// Root-first, ending at the requested step.
    pub steps: Vec<StepDetails>,
    /// Every action from the root to the requested step, in order.
    pub actions: Vec<Action>,
    /// Schema after the requested step.
    pub row_metadata: RowMetadata,
}

impl PreparationDetails {
    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id).collect()
    }

    pub fn diffs(&self) -> Vec<&StepDiff> {
        self.steps.iter().map(|s| &s.diff).collect()
    }

    /// Number of steps including the root.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` when only the root is listed.
    pub fn is_empty(&self) -> bool {
        self.steps.len() <= 1
    }
}

/// Result of deleting a step together with the steps that depend on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CascadeOutcome {
    pub head_id: StepId,
    /// Removed steps in history order, the requested one first.
    pub removed: Vec<StepId>,
}

/// Counts from one garbage collection pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct GcReport {
    pub steps_removed: usize,
    pub actions_removed: usize,
    pub steps_retained: usize,
    pub actions_retained: usize,
}
