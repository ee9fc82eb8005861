//! Rewriting the steps that follow a structural change.
//!
//! A rewrite walks the affected steps root-to-head. Each step's column
//! references are translated through a [`ColumnMapping`], then its diff is
//! recomputed against the schema the already-rewritten steps produced. The
//! ids the step used to create are paired positionally with the ids it
//! creates now, and those pairs feed the mapping for every later step.

use tracing::debug;

use recipe_actions::{ActionError, ActionRegistry};
use recipe_chain::{PendingStep, StepDiff};
use recipe_store::ActionList;
use recipe_types::{ColumnId, RowMetadata};

use crate::engine::StepDiffEngine;
use crate::error::{ConflictReason, DiffError, DiffResult};
use crate::mapping::ColumnMapping;

/// Output of a rewrite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rebased {
    /// Rewritten steps, same order as the input.
    pub steps: Vec<PendingStep>,
    /// Schema after the last rewritten step.
    pub schema: RowMetadata,
    /// Final old-to-new translation.
    pub mapping: ColumnMapping,
}

/// Renumbers column references in the steps after a mutation point.
pub struct ColumnIdShifter<'r> {
    engine: StepDiffEngine<'r>,
}

impl<'r> ColumnIdShifter<'r> {
    pub fn new(registry: &'r dyn ActionRegistry) -> Self {
        Self {
            engine: StepDiffEngine::new(registry),
        }
    }

    pub fn engine(&self) -> &StepDiffEngine<'r> {
        &self.engine
    }

    /// Move every column id `>= threshold` by `delta` in `steps`.
    ///
    /// `schema` is the schema right before the first step, as it stands
    /// after the mutation. References to a `vanished` id are conflicts.
    /// Shifting by zero with nothing vanished returns `steps` unchanged.
    pub fn shift(
        &self,
        schema: &RowMetadata,
        steps: &[PendingStep],
        delta: i64,
        threshold: ColumnId,
        vanished: impl IntoIterator<Item = ColumnId>,
    ) -> DiffResult<Rebased> {
        let mapping = ColumnMapping::offset(threshold, delta).with_vanished(vanished);
        self.rebase(schema, steps, mapping)
    }

    /// Rewrite `steps` on top of `schema` through `mapping`.
    pub fn rebase(
        &self,
        schema: &RowMetadata,
        steps: &[PendingStep],
        mut mapping: ColumnMapping,
    ) -> DiffResult<Rebased> {
        let mut schema = schema.clone();
        let mut rewritten = Vec::with_capacity(steps.len());

        for (position, step) in steps.iter().enumerate() {
            let mut diff = StepDiff::empty();
            let mut actions = Vec::with_capacity(step.actions.len());
            let mut previously_created = step.diff.created_columns.iter().copied();

            for original in &step.actions.actions {
                let params = self.engine.parameters(original)?;
                let action = params.remap_columns(original, |id| {
                    mapping.map(id).map_err(|reason| DiffError::Conflict {
                        position,
                        action: original.name.clone(),
                        column: id,
                        reason,
                    })
                })?;

                let created = match self.engine.apply_action(&mut schema, &action, &mut diff) {
                    Ok(created) => created,
                    Err(DiffError::Action(ActionError::UnknownColumn { action, column })) => {
                        return Err(DiffError::Conflict {
                            position,
                            action,
                            column,
                            reason: ConflictReason::Missing,
                        })
                    }
                    Err(e) => return Err(e),
                };
                for new in created {
                    if let Some(old) = previously_created.next() {
                        mapping.insert(old, new);
                    }
                }
                actions.push(action);
            }
            for old in previously_created {
                mapping.vanish(old);
            }

            debug!(
                position,
                created = ?diff.created_columns,
                deleted = ?diff.deleted_columns,
                "rewrote step"
            );
            rewritten.push(PendingStep::new(ActionList::new(actions), diff));
        }

        Ok(Rebased {
            steps: rewritten,
            schema,
            mapping,
        })
    }
}
