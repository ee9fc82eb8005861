//! The history mutation façade.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use recipe_actions::{ActionRegistry, StaticActionRegistry};
use recipe_chain::{ChainLink, ChainResolution, PendingStep, StepChain, StepId, ROOT_STEP};
use recipe_diff::{ColumnIdShifter, ColumnMapping, DiffError, StepDiffEngine};
use recipe_refs::{
    InMemoryPreparationLocker, InMemoryPreparationRepository, NewPreparation, Preparation,
    PreparationId, PreparationLocker, PreparationRepository,
};
use recipe_store::{ActionList, ContentStore, InMemoryContentStore, ObjectKind};
use recipe_types::{Action, ColumnId, ObjectId, RowMetadata};

use crate::config::HistoryConfig;
use crate::details::{CascadeOutcome, GcReport, PreparationDetails, StepDetails};
use crate::error::{HistoryError, HistoryResult};
use crate::guard::{MutationGuard, MutationLatch};

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn pending(link: &ChainLink) -> PendingStep {
    PendingStep::new(link.actions.clone(), link.step.diff().clone())
}

fn replay_failure(e: DiffError) -> HistoryError {
    HistoryError::InconsistentHistory(e.to_string())
}

/// Applies structural mutations to preparation histories.
///
/// Safe to share between threads. Mutations of one preparation are
/// serialised; mutations of different preparations run concurrently.
pub struct HistoryMutator {
    store: Arc<dyn ContentStore>,
    registry: Arc<dyn ActionRegistry>,
    preparations: Arc<dyn PreparationRepository>,
    locker: Arc<dyn PreparationLocker>,
    config: HistoryConfig,
    latch: MutationLatch,
    collection_gate: RwLock<()>,
}

impl HistoryMutator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        registry: Arc<dyn ActionRegistry>,
        preparations: Arc<dyn PreparationRepository>,
        locker: Arc<dyn PreparationLocker>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            store,
            registry,
            preparations,
            locker,
            config,
            latch: MutationLatch::default(),
            collection_gate: RwLock::new(()),
        }
    }

    /// A mutator over fresh in-memory backends and the default actions.
    pub fn in_memory(config: HistoryConfig) -> Self {
        Self::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(StaticActionRegistry::with_defaults()),
            Arc::new(InMemoryPreparationRepository::new()),
            Arc::new(InMemoryPreparationLocker::new()),
            config,
        )
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ContentStore {
        self.store.as_ref()
    }

    // ---------------------------------------------------------------
    // Preparations
    // ---------------------------------------------------------------

    /// Create a preparation with an empty history.
    pub fn create_preparation(&self, request: NewPreparation) -> HistoryResult<Preparation> {
        let preparation = Preparation::new(
            PreparationId::generate(),
            request,
            &self.config.app_version,
            now_millis(),
        );
        self.preparations.insert(&preparation)?;
        info!(preparation = %preparation.id, name = %preparation.name, "created preparation");
        Ok(preparation)
    }

    pub fn get_preparation(&self, id: &PreparationId) -> HistoryResult<Preparation> {
        self.preparations
            .get(id)?
            .ok_or_else(|| HistoryError::PreparationNotFound(id.clone()))
    }

    pub fn list_preparations(&self) -> HistoryResult<Vec<Preparation>> {
        Ok(self.preparations.list()?)
    }

    /// Delete the preparation pointer. Its steps stay until the next
    /// [`collect_garbage`](Self::collect_garbage).
    pub fn delete_preparation(&self, id: &PreparationId) -> HistoryResult<()> {
        let _guard = self.guard(id)?;
        if !self.preparations.remove(id)? {
            return Err(HistoryError::PreparationNotFound(id.clone()));
        }
        info!(preparation = %id, "deleted preparation");
        Ok(())
    }

    // ---------------------------------------------------------------
    // Structural mutations
    // ---------------------------------------------------------------

    /// Append one step made of `actions` after the current head.
    pub fn append_step(&self, id: &PreparationId, actions: Vec<Action>) -> HistoryResult<StepId> {
        if actions.is_empty() {
            return Err(HistoryError::EmptyActionList);
        }
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let resolution = self.resolve(&mut preparation)?;
        if resolution.len() > self.config.max_steps {
            return Err(HistoryError::TooManySteps {
                limit: self.config.max_steps,
            });
        }

        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;
        let actions = ActionList::new(actions);
        let (diff, _) = self.engine().compute_diff(last(&schemas), &actions)?;
        debug!(
            preparation = %id,
            created = ?diff.created_columns,
            deleted = ?diff.deleted_columns,
            "appending step"
        );
        let head = resolution.head().id();
        self.commit(&mut preparation, head, vec![PendingStep::new(actions, diff)])
    }

    /// Replace the actions of `step` and rewrite every step after it.
    pub fn update_step(
        &self,
        id: &PreparationId,
        step: &StepId,
        actions: Vec<Action>,
    ) -> HistoryResult<StepId> {
        if *step == ROOT_STEP.id() {
            return Err(HistoryError::RootStepImmutable);
        }
        if actions.is_empty() {
            return Err(HistoryError::EmptyActionList);
        }
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let resolution = self.resolve(&mut preparation)?;
        let position = locate(&resolution, step)?;
        let links = resolution.links();
        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;

        let before = &schemas[position - 1];
        let actions = ActionList::new(actions);
        let (diff, after) = self.engine().compute_diff(before, &actions)?;

        let old_created = &links[position].step.diff().created_columns;
        let delta = diff.created_count() as i64 - old_created.len() as i64;
        let threshold = after_allocations(before, old_created.len());
        let vanished = old_created.iter().skip(diff.created_count()).copied();
        let suffix: Vec<PendingStep> = links[position + 1..].iter().map(pending).collect();
        let rebased = self.shifter().shift(&after, &suffix, delta, threshold, vanished)?;

        debug!(preparation = %id, step = %step.short_hex(), delta, rewritten = suffix.len(), "updating step");
        let mut steps = Vec::with_capacity(rebased.steps.len() + 1);
        steps.push(PendingStep::new(actions, diff));
        steps.extend(rebased.steps);
        self.commit(&mut preparation, links[position - 1].step.id(), steps)
    }

    /// Remove `step`. Fails with a conflict if a later step uses a column
    /// it created.
    pub fn delete_step(&self, id: &PreparationId, step: &StepId) -> HistoryResult<StepId> {
        if *step == ROOT_STEP.id() {
            return Err(HistoryError::RootStepCannotBeDeleted);
        }
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let resolution = self.resolve(&mut preparation)?;
        let position = locate(&resolution, step)?;
        let links = resolution.links();
        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;

        let before = &schemas[position - 1];
        let created = &links[position].step.diff().created_columns;
        let threshold = after_allocations(before, created.len());
        let suffix: Vec<PendingStep> = links[position + 1..].iter().map(pending).collect();
        let rebased = self.shifter().shift(
            before,
            &suffix,
            -(created.len() as i64),
            threshold,
            created.iter().copied(),
        )?;

        debug!(preparation = %id, step = %step.short_hex(), rewritten = suffix.len(), "deleting step");
        self.commit(&mut preparation, links[position - 1].step.id(), rebased.steps)
    }

    /// Remove `step` together with every later step that transitively uses
    /// a column it created.
    pub fn delete_step_with_dependents(
        &self,
        id: &PreparationId,
        step: &StepId,
    ) -> HistoryResult<CascadeOutcome> {
        if *step == ROOT_STEP.id() {
            return Err(HistoryError::RootStepCannotBeDeleted);
        }
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let resolution = self.resolve(&mut preparation)?;
        let position = locate(&resolution, step)?;
        let links = resolution.links();
        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;
        let engine = self.engine();

        let mut dropped: HashSet<ColumnId> =
            links[position].step.diff().created_columns.iter().copied().collect();
        let mut removed = vec![*step];
        let mut survivors = Vec::new();
        for link in &links[position + 1..] {
            let mut depends = false;
            for action in &link.actions.actions {
                let columns = engine.referenced_columns(action).map_err(replay_failure)?;
                if columns.iter().any(|c| dropped.contains(c)) {
                    depends = true;
                    break;
                }
            }
            if depends {
                dropped.extend(link.step.diff().created_columns.iter().copied());
                removed.push(link.step.id());
            } else {
                survivors.push(pending(link));
            }
        }

        let mapping = ColumnMapping::identity().with_vanished(dropped);
        let rebased = self
            .shifter()
            .rebase(&schemas[position - 1], &survivors, mapping)?;
        info!(preparation = %id, removed = removed.len(), "deleting step with dependents");
        let head_id = self.commit(&mut preparation, links[position - 1].step.id(), rebased.steps)?;
        Ok(CascadeOutcome { head_id, removed })
    }

    /// Move `step` so that it directly follows `new_parent`.
    pub fn reorder_step(
        &self,
        id: &PreparationId,
        step: &StepId,
        new_parent: &StepId,
    ) -> HistoryResult<StepId> {
        if *step == ROOT_STEP.id() {
            return Err(HistoryError::RootStepImmutable);
        }
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let resolution = self.resolve(&mut preparation)?;
        let from = locate(&resolution, step)?;
        let to = locate(&resolution, new_parent)?;
        if to == from || to + 1 == from {
            debug!(preparation = %id, step = %step.short_hex(), "step already in place");
            return Ok(resolution.head().id());
        }

        let links = resolution.links();
        // `order[k]` is the link at chain position `k + 1`.
        let mut order: Vec<&ChainLink> = links[1..].iter().collect();
        let moved = order.remove(from - 1);
        order.insert(if to < from { to } else { to - 1 }, moved);

        let start = from.min(to + 1);
        let suffix: Vec<PendingStep> = order[start - 1..].iter().map(|l| pending(l)).collect();
        let mapping = ColumnMapping::identity().with_pending(
            suffix
                .iter()
                .flat_map(|s| s.diff.created_columns.iter().copied()),
        );
        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;
        let rebased = self
            .shifter()
            .rebase(&schemas[start - 1], &suffix, mapping)?;

        debug!(
            preparation = %id,
            step = %step.short_hex(),
            parent = %new_parent.short_hex(),
            "reordering step"
        );
        self.commit(&mut preparation, links[start - 1].step.id(), rebased.steps)
    }

    /// Point the preparation at an existing step.
    pub fn set_head(&self, id: &PreparationId, step: &StepId) -> HistoryResult<()> {
        let _guard = self.guard(id)?;
        let mut preparation = self.get_preparation(id)?;
        let chain = self.chain();
        if chain.load_step(step)?.is_none() {
            return Err(HistoryError::StepNotFound(*step));
        }
        if chain.resolve_path_to_root(step)?.healed().is_some() {
            warn!(step = %step.short_hex(), "refusing head whose history is incomplete");
            return Err(HistoryError::StepNotFound(*step));
        }
        if preparation.move_head(*step, now_millis()) {
            self.preparations.update(&preparation)?;
            info!(preparation = %id, head = %step.short_hex(), "moved head");
        }
        Ok(())
    }

    /// Replay every step of `reference` on top of the empty history of
    /// `target`. A missing reference is not an error: nothing is copied.
    pub fn copy_steps(
        &self,
        target: &PreparationId,
        reference: &PreparationId,
    ) -> HistoryResult<StepId> {
        let _guard = self.guard(target)?;
        let mut preparation = self.get_preparation(target)?;
        let Some(source) = self.preparations.get(reference)? else {
            debug!(preparation = %target, reference = %reference, "reference preparation not found, nothing to copy");
            return Ok(preparation.head_id);
        };
        if preparation.has_steps() {
            return Err(HistoryError::PreparationNotEmpty(target.clone()));
        }

        let resolution = self.chain().resolve_path_to_root(&source.head_id)?;
        if resolution.len() > self.config.max_steps + 1 {
            return Err(HistoryError::TooManySteps {
                limit: self.config.max_steps,
            });
        }
        let steps: Vec<PendingStep> = resolution.links()[1..].iter().map(pending).collect();
        let mapping = ColumnMapping::identity().with_pending(
            steps
                .iter()
                .flat_map(|s| s.diff.created_columns.iter().copied()),
        );
        let rebased = self
            .shifter()
            .rebase(&preparation.row_metadata, &steps, mapping)?;
        info!(preparation = %target, reference = %reference, steps = steps.len(), "copying steps");
        self.commit(&mut preparation, ROOT_STEP.id(), rebased.steps)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// The history from the root up to `step` (the head by default).
    pub fn get_details(
        &self,
        id: &PreparationId,
        step: Option<&StepId>,
    ) -> HistoryResult<PreparationDetails> {
        let mut preparation = self.get_preparation(id)?;
        let mut resolution = self.chain().resolve_path_to_root(&preparation.head_id)?;
        if resolution.healed().is_some() && self.config.heal_broken_chains {
            let _guard = self.guard(id)?;
            preparation = self.get_preparation(id)?;
            resolution = self.resolve(&mut preparation)?;
        }

        let end = match step {
            Some(step) => locate(&resolution, step)?,
            None => resolution.len() - 1,
        };
        let schemas = self.schemas(&preparation.row_metadata, &resolution)?;
        let links = &resolution.links()[..=end];
        Ok(PreparationDetails {
            preparation_id: preparation.id.clone(),
            head_id: resolution.head().id(),
            steps: links
                .iter()
                .map(|link| StepDetails {
                    id: link.step.id(),
                    parent: link.step.parent(),
                    diff: link.step.diff().clone(),
                    actions: link.actions.actions.clone(),
                })
                .collect(),
            actions: links
                .iter()
                .flat_map(|link| link.actions.actions.iter().cloned())
                .collect(),
            row_metadata: schemas[end].clone(),
        })
    }

    // ---------------------------------------------------------------
    // Garbage collection
    // ---------------------------------------------------------------

    /// Remove every step and action list no preparation can reach.
    pub fn collect_garbage(&self) -> HistoryResult<GcReport> {
        let _exclusive = self.collection_gate.write().expect("lock poisoned");
        let chain = self.chain();
        let mut live_steps = HashSet::new();
        let mut live_actions = HashSet::new();

        for preparation in self.preparations.list()? {
            let mut current = preparation.head_id;
            while current != ROOT_STEP.id() && live_steps.insert(current) {
                let Some(step) = chain.load_step(&current)? else {
                    break;
                };
                live_actions.insert(step.content());
                match step.parent() {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }

        let mut report = GcReport::default();
        let (removed, retained) = self.sweep(ObjectKind::Step, &live_steps)?;
        report.steps_removed = removed;
        report.steps_retained = retained;
        let (removed, retained) = self.sweep(ObjectKind::Actions, &live_actions)?;
        report.actions_removed = removed;
        report.actions_retained = retained;

        info!(
            steps_removed = report.steps_removed,
            actions_removed = report.actions_removed,
            "collected garbage"
        );
        Ok(report)
    }

    fn sweep(&self, kind: ObjectKind, live: &HashSet<ObjectId>) -> HistoryResult<(usize, usize)> {
        let (mut removed, mut retained) = (0, 0);
        for id in self.store.list(kind)? {
            if live.contains(&id) {
                retained += 1;
            } else if self.store.remove(&id)? {
                debug!(object = %id.short_hex(), kind = %kind, "swept object");
                removed += 1;
            }
        }
        Ok((removed, retained))
    }

    // ---------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------

    fn guard(&self, id: &PreparationId) -> HistoryResult<MutationGuard<'_>> {
        MutationGuard::acquire(
            &self.latch,
            self.locker.as_ref(),
            &self.collection_gate,
            id,
            &self.config.lock_owner,
        )
    }

    fn chain(&self) -> StepChain<'_> {
        StepChain::new(self.store.as_ref())
    }

    fn engine(&self) -> StepDiffEngine<'_> {
        StepDiffEngine::new(self.registry.as_ref())
    }

    fn shifter(&self) -> ColumnIdShifter<'_> {
        ColumnIdShifter::new(self.registry.as_ref())
    }

    /// Resolve the preparation's chain, persisting a healed head when
    /// configured to. Callers must hold the preparation guard.
    fn resolve(&self, preparation: &mut Preparation) -> HistoryResult<ChainResolution> {
        let resolution = self.chain().resolve_path_to_root(&preparation.head_id)?;
        if let Some(healed) = resolution.healed() {
            warn!(
                preparation = %preparation.id,
                head = %preparation.head_id.short_hex(),
                healed = %healed.short_hex(),
                "inconsistent history, truncated to last intact step"
            );
            if self.config.heal_broken_chains && preparation.move_head(healed, now_millis()) {
                self.preparations.update(preparation)?;
            }
        }
        Ok(resolution)
    }

    /// `schemas[k]` is the schema after chain position `k`.
    fn schemas(
        &self,
        initial: &RowMetadata,
        resolution: &ChainResolution,
    ) -> HistoryResult<Vec<RowMetadata>> {
        let engine = self.engine();
        let mut schemas = Vec::with_capacity(resolution.len());
        schemas.push(initial.clone());
        for link in &resolution.links()[1..] {
            let (_, next) = engine
                .compute_diff(last(&schemas), &link.actions)
                .map_err(replay_failure)?;
            schemas.push(next);
        }
        Ok(schemas)
    }

    /// Persist `steps` after `anchor` and move the head to the new tip.
    fn commit(
        &self,
        preparation: &mut Preparation,
        anchor: StepId,
        steps: Vec<PendingStep>,
    ) -> HistoryResult<StepId> {
        let head = match self.chain().insert_after(&anchor, steps)?.last() {
            Some(tip) => tip.id(),
            None => anchor,
        };
        if preparation.move_head(head, now_millis()) {
            self.preparations.update(preparation)?;
            info!(preparation = %preparation.id, head = %head.short_hex(), "moved head");
        }
        Ok(head)
    }
}

fn locate(resolution: &ChainResolution, step: &StepId) -> HistoryResult<usize> {
    resolution
        .position(step)
        .ok_or(HistoryError::StepNotFound(*step))
}

fn last(schemas: &[RowMetadata]) -> &RowMetadata {
    &schemas[schemas.len() - 1]
}

/// First id not consumed by a step that allocated `count` columns on top
/// of `before`.
fn after_allocations(before: &RowMetadata, count: usize) -> ColumnId {
    let start = before
        .next_column_id()
        .map(|id| id.value())
        .unwrap_or(u32::MAX);
    ColumnId::new(start.saturating_add(u32::try_from(count).unwrap_or(u32::MAX)))
}

impl std::fmt::Debug for HistoryMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryMutator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
