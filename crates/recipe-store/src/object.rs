use serde::{Deserialize, Serialize};

use recipe_types::{Action, ObjectId};

use crate::error::{StoreError, StoreResult};
use crate::hasher::ContentHasher;

/// What a stored blob decodes to. Also selects the hash domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Actions,
    Step,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Actions => "actions",
            Self::Step => "step",
        })
    }
}

/// Encoded bytes plus the kind they decode to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    pub kind: ObjectKind,
    pub data: Vec<u8>,
    pub size: u64,
}

impl StoredObject {
    pub fn new(kind: ObjectKind, data: Vec<u8>) -> Self {
        let size = data.len() as u64;
        Self { kind, data, size }
    }

    /// Hash of `data` in the domain of `kind`.
    pub fn compute_id(&self) -> ObjectId {
        let hasher = match self.kind {
            ObjectKind::Actions => ContentHasher::ACTIONS,
            ObjectKind::Step => ContentHasher::STEP,
        };
        hasher.hash(&self.data)
    }

    pub fn expect_kind(&self, kind: ObjectKind) -> StoreResult<()> {
        if self.kind == kind {
            return Ok(());
        }
        Err(StoreError::CorruptObject {
            id: self.compute_id(),
            reason: format!("expected {kind}, got {}", self.kind),
        })
    }
}

// ---------------------------------------------------------------------------
// ActionList
// ---------------------------------------------------------------------------

/// The actions a step applies, stored once and shared by every step that
/// applies the same list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionList {
    pub actions: Vec<Action>,
}

impl ActionList {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Id the list is stored under, computed without touching a store.
    pub fn content_id(&self) -> StoreResult<ObjectId> {
        Ok(self.to_stored_object()?.compute_id())
    }

    pub fn to_stored_object(&self) -> StoreResult<StoredObject> {
        let data = serde_json::to_vec(self)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Actions, data))
    }

    pub fn from_stored_object(obj: &StoredObject) -> StoreResult<Self> {
        obj.expect_kind(ObjectKind::Actions)?;
        serde_json::from_slice(&obj.data).map_err(|e| StoreError::CorruptObject {
            id: obj.compute_id(),
            reason: e.to_string(),
        })
    }
}
