//! Per-preparation mutual exclusion.
//!
//! Two layers: the external [`PreparationLocker`] excludes other processes,
//! and an in-process latch serialises callers of this process, which all
//! present the same lock owner and would otherwise pass straight through
//! the locker's idempotent re-lock.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use recipe_refs::{PreparationId, PreparationLocker};

use crate::error::HistoryResult;

#[derive(Debug, Default)]
pub(crate) struct MutationLatch {
    active: Mutex<HashSet<PreparationId>>,
    released: Condvar,
}

impl MutationLatch {
    fn enter(&self, preparation: &PreparationId) {
        let mut active = self.active.lock().expect("lock poisoned");
        while active.contains(preparation) {
            active = self.released.wait(active).expect("lock poisoned");
        }
        active.insert(preparation.clone());
    }

    fn leave(&self, preparation: &PreparationId) {
        let mut active = self.active.lock().expect("lock poisoned");
        active.remove(preparation);
        self.released.notify_all();
    }
}

/// Exclusive access to one preparation, released on drop.
pub struct MutationGuard<'a> {
    latch: &'a MutationLatch,
    locker: &'a dyn PreparationLocker,
    owner: &'a str,
    preparation: PreparationId,
    /// `false` when `owner` already held the external lock before
    /// `acquire`; that lock is then left in place on drop.
    owns_lock: bool,
    _collection: RwLockReadGuard<'a, ()>,
}

impl<'a> MutationGuard<'a> {
    /// Block until no other in-process mutation holds `preparation`, then
    /// take the external lock unless `owner` already holds it.
    pub(crate) fn acquire(
        latch: &'a MutationLatch,
        locker: &'a dyn PreparationLocker,
        collection_gate: &'a RwLock<()>,
        preparation: &PreparationId,
        owner: &'a str,
    ) -> HistoryResult<Self> {
        let collection = collection_gate.read().expect("lock poisoned");
        latch.enter(preparation);
        let taken = locker
            .holder(preparation)
            .and_then(|holder| {
                let held = holder.as_deref() == Some(owner);
                locker.lock(preparation, owner).map(|()| !held)
            });
        let owns_lock = match taken {
            Ok(owns_lock) => owns_lock,
            Err(e) => {
                latch.leave(preparation);
                return Err(e.into());
            }
        };
        debug!(preparation = %preparation, owner, owns_lock, "acquired mutation guard");
        Ok(Self {
            latch,
            locker,
            owner,
            preparation: preparation.clone(),
            owns_lock,
            _collection: collection,
        })
    }

    pub fn preparation(&self) -> &PreparationId {
        &self.preparation
    }
}

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        if self.owns_lock {
            if let Err(e) = self.locker.unlock(&self.preparation, self.owner) {
                warn!(preparation = %self.preparation, error = %e, "failed to release lock");
            }
        }
        self.latch.leave(&self.preparation);
        debug!(preparation = %self.preparation, "released mutation guard");
    }
}
