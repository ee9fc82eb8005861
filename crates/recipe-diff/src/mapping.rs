use std::collections::{BTreeMap, BTreeSet};

use recipe_types::ColumnId;

use crate::error::ConflictReason;

/// Translation of column ids from an old history to a rewritten one.
///
/// Lookups are resolved in a fixed order: vanished ids fail, explicit pairs
/// win next, pending ids fail, then the offset applies to ids at or above
/// its threshold. Anything else maps to itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    offset: Option<(ColumnId, i64)>,
    explicit: BTreeMap<ColumnId, ColumnId>,
    vanished: BTreeSet<ColumnId>,
    pending: BTreeSet<ColumnId>,
}

impl ColumnMapping {
    /// The mapping that changes nothing.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Every id `>= threshold` moves by `delta`.
    pub fn offset(threshold: ColumnId, delta: i64) -> Self {
        Self {
            offset: (delta != 0).then_some((threshold, delta)),
            ..Self::default()
        }
    }

    /// Mark ids that no longer exist after the mutation.
    pub fn with_vanished(mut self, ids: impl IntoIterator<Item = ColumnId>) -> Self {
        self.vanished.extend(ids);
        self
    }

    /// Mark ids whose creator has not been rewritten yet.
    pub fn with_pending(mut self, ids: impl IntoIterator<Item = ColumnId>) -> Self {
        self.pending.extend(ids);
        self
    }

    /// Record that `old` is now `new`. Clears any pending mark on `old`.
    pub fn insert(&mut self, old: ColumnId, new: ColumnId) {
        self.pending.remove(&old);
        self.explicit.insert(old, new);
    }

    /// Record that `old` is gone.
    pub fn vanish(&mut self, old: ColumnId) {
        self.pending.remove(&old);
        self.explicit.remove(&old);
        self.vanished.insert(old);
    }

    pub fn is_identity(&self) -> bool {
        self.offset.is_none()
            && self.vanished.is_empty()
            && self.pending.is_empty()
            && self.explicit.iter().all(|(old, new)| old == new)
    }

    /// The new id of `id`.
    pub fn map(&self, id: ColumnId) -> Result<ColumnId, ConflictReason> {
        if self.vanished.contains(&id) {
            return Err(ConflictReason::Deleted);
        }
        if let Some(new) = self.explicit.get(&id) {
            return Ok(*new);
        }
        if self.pending.contains(&id) {
            return Err(ConflictReason::NotYetCreated);
        }
        match self.offset {
            Some((threshold, delta)) if id >= threshold => {
                id.offset(delta).map_err(|_| ConflictReason::OutOfRange)
            }
            _ => Ok(id),
        }
    }
}
