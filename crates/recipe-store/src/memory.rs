use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard};

use tracing::debug;

use recipe_types::ObjectId;

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectKind, StoredObject};
use crate::traits::ContentStore;

/// Content store held in process memory.
///
/// Keyed by a `BTreeMap` so `list` comes out sorted without extra work.
#[derive(Default)]
pub struct InMemoryContentStore {
    objects: RwLock<BTreeMap<ObjectId, StoredObject>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<ObjectId, StoredObject>> {
        self.objects.read().expect("lock poisoned")
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of stored action lists or step records.
    pub fn count(&self, kind: ObjectKind) -> usize {
        self.read().values().filter(|o| o.kind == kind).count()
    }
}

impl ContentStore for InMemoryContentStore {
    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>> {
        Ok(self.read().get(id).cloned())
    }

    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId> {
        let id = object.compute_id();
        if id.is_null() {
            return Err(StoreError::NullObjectId);
        }
        let mut objects = self.objects.write().expect("lock poisoned");
        if !objects.contains_key(&id) {
            debug!(object = %id.short_hex(), kind = %object.kind, size = object.size, "stored object");
            objects.insert(id, object.clone());
        }
        Ok(id)
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(self.read().contains_key(id))
    }

    fn remove(&self, id: &ObjectId) -> StoreResult<bool> {
        let removed = self.objects.write().expect("lock poisoned").remove(id);
        Ok(removed.is_some())
    }

    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<ObjectId>> {
        Ok(self
            .read()
            .iter()
            .filter(|(_, o)| o.kind == kind)
            .map(|(id, _)| *id)
            .collect())
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("actions", &self.count(ObjectKind::Actions))
            .field("steps", &self.count(ObjectKind::Step))
            .finish()
    }
}
