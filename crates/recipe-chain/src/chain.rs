//! Traversal and persistence of step chains.
//!
//! # Invariants
//!
//! - A resolved chain is a simple path from [`ROOT_STEP`] to its head.
//! - Writes are append-only: new objects are put, existing ones never change.
//! - A failed write never removes objects; unreachable ones are left to
//!   garbage collection.

use std::collections::HashSet;

use tracing::{debug, warn};

use recipe_store::{ActionList, ContentStore};

use crate::error::{ChainError, ChainResult};
use crate::step::{PendingStep, Step, StepId, ROOT_STEP};

/// A step together with the actions it applies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainLink {
    pub step: Step,
    pub actions: ActionList,
}

impl ChainLink {
    fn root() -> Self {
        Self {
            step: ROOT_STEP.clone(),
            actions: ActionList::empty(),
        }
    }
}

/// Result of resolving a head to the root.
#[derive(Clone, Debug)]
pub struct ChainResolution {
    /// Root-first; `links[0]` is always the root.
    links: Vec<ChainLink>,
    /// Set when the requested head was unresolvable and the chain was
    /// truncated to its last intact step.
    healed: Option<StepId>,
}

impl ChainResolution {
    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    /// The step the chain actually ends at.
    pub fn head(&self) -> &Step {
        // links is never empty: the root is always present.
        &self.links[self.links.len() - 1].step
    }

    /// The healed head, if resolution had to truncate.
    pub fn healed(&self) -> Option<StepId> {
        self.healed
    }

    /// Number of links including the root.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// `true` when only the root is present.
    pub fn is_empty(&self) -> bool {
        self.links.len() == 1
    }

    /// Position of a step, root being 0.
    pub fn position(&self, id: &StepId) -> Option<usize> {
        self.links.iter().position(|link| link.step.id() == *id)
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        self.links.iter().map(|link| link.step.id()).collect()
    }
}

/// Reads and writes step chains in a content store.
pub struct StepChain<'a> {
    store: &'a dyn ContentStore,
}

impl<'a> StepChain<'a> {
    pub fn new(store: &'a dyn ContentStore) -> Self {
        Self { store }
    }

    /// Load a step by id. The root is always available.
    pub fn load_step(&self, id: &StepId) -> ChainResult<Option<Step>> {
        if *id == ROOT_STEP.id() {
            return Ok(Some(ROOT_STEP.clone()));
        }
        match self.store.get(id)? {
            Some(obj) => Ok(Some(Step::from_stored_object(&obj)?)),
            None => Ok(None),
        }
    }

    /// Load the action list of a step.
    pub fn load_actions(&self, step: &Step) -> ChainResult<Option<ActionList>> {
        if step.is_root() {
            return Ok(Some(ActionList::empty()));
        }
        match self.store.get(&step.content())? {
            Some(obj) => Ok(Some(ActionList::from_stored_object(&obj)?)),
            None => Ok(None),
        }
    }

    /// Follow parent links from `head` to the root.
    ///
    /// Resolution never fails on missing objects. A step whose action list
    /// is gone is dropped along with everything after it, and resolution
    /// continues from its parent. A missing step record or a cycle leaves no
    /// intact prefix, so the chain falls back to the root. Either way the
    /// new head is reported through [`ChainResolution::healed`].
    pub fn resolve_path_to_root(&self, head: &StepId) -> ChainResult<ChainResolution> {
        let mut collected: Vec<ChainLink> = Vec::new();
        let mut visited = HashSet::new();
        let mut healed = None;
        let mut current = *head;

        while current != ROOT_STEP.id() {
            if !visited.insert(current) {
                warn!(step = %current.short_hex(), "cycle in step chain, falling back to root");
                collected.clear();
                healed = Some(ROOT_STEP.id());
                break;
            }
            let Some(step) = self.load_step(&current)? else {
                warn!(step = %current.short_hex(), "missing step, falling back to root");
                collected.clear();
                healed = Some(ROOT_STEP.id());
                break;
            };
            let parent = step.parent().unwrap_or_else(|| ROOT_STEP.id());
            match self.load_actions(&step)? {
                Some(actions) => collected.push(ChainLink { step, actions }),
                None => {
                    warn!(
                        step = %current.short_hex(),
                        content = %step.content().short_hex(),
                        "missing action list, truncating chain"
                    );
                    collected.clear();
                    healed = Some(parent);
                }
            }
            current = parent;
        }

        let mut links = Vec::with_capacity(collected.len() + 1);
        links.push(ChainLink::root());
        links.extend(collected.into_iter().rev());
        Ok(ChainResolution { links, healed })
    }

    /// Persist one step on top of `parent`.
    pub fn append(&self, parent: &StepId, pending: PendingStep) -> ChainResult<Step> {
        let mut steps = self.insert_after(parent, vec![pending])?;
        steps.pop().ok_or(ChainError::StepNotFound(*parent))
    }

    /// Persist `pending` as a fresh suffix starting right after `anchor`.
    ///
    /// Every step gets a new id because its parent changed. Returns the new
    /// steps in order; the last one is the new tip.
    ///
    /// A failed write returns the error and leaves what was already written
    /// in place. Objects are shared between preparations by content, so one
    /// written here may meanwhile be referenced by another head; unreachable
    /// leftovers are reclaimed by garbage collection only.
    pub fn insert_after(&self, anchor: &StepId, pending: Vec<PendingStep>) -> ChainResult<Vec<Step>> {
        if self.load_step(anchor)?.is_none() {
            return Err(ChainError::StepNotFound(*anchor));
        }

        let mut parent = *anchor;
        let mut steps = Vec::with_capacity(pending.len());
        for PendingStep { actions, diff } in pending {
            let content = self.store.put(&actions.to_stored_object()?)?;
            let step = Step::new(parent, content, diff)?;
            self.store.put(&step.to_stored_object()?)?;
            debug!(
                step = %step.id().short_hex(),
                parent = %parent.short_hex(),
                actions = actions.len(),
                "linked step"
            );
            parent = step.id();
            steps.push(step);
        }
        Ok(steps)
    }
}
