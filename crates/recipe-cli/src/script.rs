//! JSON scripts of history mutations.
//!
//! Steps are addressed by their position in the preparation's current
//! history, `0` being the root.

use anyhow::{bail, Context};
use serde::Deserialize;

use recipe_history::{HistoryError, HistoryMutator};
use recipe_refs::{NewPreparation, PreparationId};
use recipe_types::{Action, ColumnId, ColumnMetadata, ObjectId, RowMetadata};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default = "default_name")]
    pub name: String,
    /// Column names of the dataset; ids are assigned from `0001`.
    pub columns: Vec<String>,
    #[serde(default)]
    pub operations: Vec<Operation>,
}

fn default_name() -> String {
    "script".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum Operation {
    Append {
        actions: Vec<Action>,
    },
    Update {
        step: usize,
        actions: Vec<Action>,
    },
    Delete {
        step: usize,
        #[serde(default)]
        cascade: bool,
    },
    Reorder {
        step: usize,
        after: usize,
    },
    SetHead {
        step: usize,
    },
}

impl Operation {
    pub fn label(&self) -> String {
        match self {
            Self::Append { actions } => format!("append {}", names(actions)),
            Self::Update { step, actions } => format!("update #{step} to {}", names(actions)),
            Self::Delete { step, cascade: false } => format!("delete #{step}"),
            Self::Delete { step, cascade: true } => format!("delete #{step} with dependents"),
            Self::Reorder { step, after } => format!("move #{step} after #{after}"),
            Self::SetHead { step } => format!("set head to #{step}"),
        }
    }
}

fn names(actions: &[Action]) -> String {
    actions
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join("+")
}

impl Script {
    pub fn parse(source: &str) -> anyhow::Result<Self> {
        serde_json::from_str(source).context("invalid script")
    }

    pub fn row_metadata(&self) -> RowMetadata {
        RowMetadata::new(
            self.columns
                .iter()
                .zip(1u32..)
                .map(|(name, id)| ColumnMetadata::new(ColumnId::new(id), name.as_str()))
                .collect(),
        )
    }

    pub fn create(&self, mutator: &HistoryMutator) -> anyhow::Result<PreparationId> {
        let preparation = mutator.create_preparation(NewPreparation {
            dataset_id: format!("{}-dataset", self.name),
            name: self.name.clone(),
            author: "recipe-cli".into(),
            row_metadata: self.row_metadata(),
        })?;
        Ok(preparation.id)
    }
}

/// The step at `position` in the current history of `id`.
fn step_at(mutator: &HistoryMutator, id: &PreparationId, position: usize) -> anyhow::Result<ObjectId> {
    let details = mutator.get_details(id, None)?;
    match details.steps.get(position) {
        Some(step) => Ok(step.id),
        None => bail!(
            "no step #{position}: the history has {} steps after the root",
            details.len() - 1
        ),
    }
}

/// Outcome of one operation: the new head, or the mutation's refusal.
pub enum Outcome {
    Head(ObjectId),
    Refused(HistoryError),
}

pub fn apply(
    mutator: &HistoryMutator,
    id: &PreparationId,
    operation: &Operation,
) -> anyhow::Result<Outcome> {
    let result = match operation {
        Operation::Append { actions } => mutator.append_step(id, actions.clone()),
        Operation::Update { step, actions } => {
            let step = step_at(mutator, id, *step)?;
            mutator.update_step(id, &step, actions.clone())
        }
        Operation::Delete { step, cascade } => {
            let step = step_at(mutator, id, *step)?;
            if *cascade {
                mutator
                    .delete_step_with_dependents(id, &step)
                    .map(|outcome| outcome.head_id)
            } else {
                mutator.delete_step(id, &step)
            }
        }
        Operation::Reorder { step, after } => {
            let step = step_at(mutator, id, *step)?;
            let parent = step_at(mutator, id, *after)?;
            mutator.reorder_step(id, &step, &parent)
        }
        Operation::SetHead { step } => {
            let step = step_at(mutator, id, *step)?;
            mutator.set_head(id, &step).map(|()| step)
        }
    };
    Ok(match result {
        Ok(head) => Outcome::Head(head),
        Err(e) => Outcome::Refused(e),
    })
}
