//! Simulated application of actions against a schema.
//!
//! The engine never touches data. It asks the registry what each action does
//! to the column list and replays those effects, which is enough to derive
//! the ids a step allocates and removes.

use tracing::trace;

use recipe_actions::{ActionError, ActionParameters, ActionRegistry};
use recipe_chain::StepDiff;
use recipe_store::ActionList;
use recipe_types::{Action, ColumnId, RowMetadata};

use crate::error::DiffResult;

/// Computes step diffs from action lists.
pub struct StepDiffEngine<'r> {
    registry: &'r dyn ActionRegistry,
}

impl<'r> StepDiffEngine<'r> {
    pub fn new(registry: &'r dyn ActionRegistry) -> Self {
        Self { registry }
    }

    /// Type the parameters of `action` against its descriptor.
    pub fn parameters(&self, action: &Action) -> DiffResult<ActionParameters> {
        let descriptor = self.registry.resolve_or_pass_through(&action.name);
        Ok(descriptor.schema().parse(action)?)
    }

    /// Every column `action` refers to through its parameters.
    pub fn referenced_columns(&self, action: &Action) -> DiffResult<Vec<ColumnId>> {
        Ok(self.parameters(action)?.referenced_columns())
    }

    /// Diff of a whole step against `prior`, plus the schema it leaves.
    ///
    /// Actions are applied in order and each one sees the schema the
    /// previous one produced, so an action may use a column created earlier
    /// in the same step.
    pub fn compute_diff(
        &self,
        prior: &RowMetadata,
        actions: &ActionList,
    ) -> DiffResult<(StepDiff, RowMetadata)> {
        let mut schema = prior.clone();
        let mut diff = StepDiff::empty();
        for action in &actions.actions {
            self.apply_action(&mut schema, action, &mut diff)?;
        }
        Ok((diff, schema))
    }

    /// Apply one action to `schema`, recording its effects in `diff`.
    ///
    /// Returns the ids the action allocated, in allocation order.
    pub fn apply_action(
        &self,
        schema: &mut RowMetadata,
        action: &Action,
        diff: &mut StepDiff,
    ) -> DiffResult<Vec<ColumnId>> {
        let descriptor = self.registry.resolve_or_pass_through(&action.name);
        let params = descriptor.schema().parse(action)?;
        let effects = descriptor.column_effects(&params, schema)?;

        if let Some(column) = effects
            .reads
            .iter()
            .chain(&effects.deletes)
            .chain(effects.renames.iter().map(|(id, _)| id))
            .find(|id| !schema.contains(**id))
        {
            return Err(ActionError::UnknownColumn {
                action: action.name.clone(),
                column: *column,
            }
            .into());
        }

        let mut created = Vec::with_capacity(effects.creates.len());
        let mut anchor = effects.insert_after;
        for column in effects.creates {
            let id = schema
                .allocate(column.name, column.column_type, anchor)
                .map_err(|source| ActionError::ColumnAllocation {
                    action: action.name.clone(),
                    source,
                })?;
            anchor = Some(id);
            created.push(id);
        }
        for (id, name) in effects.renames {
            schema.rename(id, name);
        }
        for id in effects.deletes {
            if schema.remove(id).is_some() {
                diff.deleted_columns.push(id);
            }
        }
        diff.created_columns.extend_from_slice(&created);
        trace!(action = %action.name, created = created.len(), "applied action");
        Ok(created)
    }

    /// Schema left by applying every list in order to `initial`.
    pub fn replay<'a>(
        &self,
        initial: &RowMetadata,
        steps: impl IntoIterator<Item = &'a ActionList>,
    ) -> DiffResult<RowMetadata> {
        let mut schema = initial.clone();
        for actions in steps {
            schema = self.compute_diff(&schema, actions)?.1;
        }
        Ok(schema)
    }
}
