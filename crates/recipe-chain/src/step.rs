use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use recipe_store::{ActionList, ContentHasher, ObjectKind, StoredObject};
use recipe_types::{ColumnId, ObjectId};

use crate::error::{ChainError, ChainResult};

/// Identifier of a step: the content hash of its stored record.
pub type StepId = ObjectId;

/// The sentinel every chain ends at: no parent, no content, empty diff.
pub static ROOT_STEP: LazyLock<Step> = LazyLock::new(Step::root);

const ROOT_MARKER: &[u8] = b"root";

/// Columns one step creates and deletes relative to its parent's schema.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepDiff {
    /// Ids allocated by the step, in allocation order.
    #[serde(default)]
    pub created_columns: Vec<ColumnId>,
    /// Ids removed by the step.
    #[serde(default)]
    pub deleted_columns: Vec<ColumnId>,
}

impl StepDiff {
    pub fn new(created_columns: Vec<ColumnId>, deleted_columns: Vec<ColumnId>) -> Self {
        Self {
            created_columns,
            deleted_columns,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn created_count(&self) -> usize {
        self.created_columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.created_columns.is_empty() && self.deleted_columns.is_empty()
    }
}

/// The hashed part of a step.
#[derive(Serialize, Deserialize)]
struct StepRecord {
    parent: StepId,
    content: ObjectId,
    diff: StepDiff,
}

/// One immutable point in a recipe history.
///
/// The id is derived from `(parent, content, diff)`, so a step cannot be
/// edited: any change yields a different step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    id: StepId,
    parent: Option<StepId>,
    content: ObjectId,
    diff: StepDiff,
}

impl Step {
    /// Build a non-root step and derive its id.
    pub fn new(parent: StepId, content: ObjectId, diff: StepDiff) -> ChainResult<Self> {
        let record = StepRecord {
            parent,
            content,
            diff,
        };
        let id = Self::encode(&record)?.compute_id();
        Ok(Self {
            id,
            parent: Some(record.parent),
            content: record.content,
            diff: record.diff,
        })
    }

    fn root() -> Self {
        Self {
            id: ContentHasher::STEP.hash(ROOT_MARKER),
            parent: None,
            content: ObjectId::null(),
            diff: StepDiff::empty(),
        }
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn parent(&self) -> Option<StepId> {
        self.parent
    }

    /// Id of the action list this step applies. Null for the root.
    pub fn content(&self) -> ObjectId {
        self.content
    }

    pub fn diff(&self) -> &StepDiff {
        &self.diff
    }

    pub fn is_root(&self) -> bool {
        self.id == ROOT_STEP.id
    }

    fn encode(record: &StepRecord) -> ChainResult<StoredObject> {
        let data =
            serde_json::to_vec(record).map_err(|e| ChainError::Serialization(e.to_string()))?;
        Ok(StoredObject::new(ObjectKind::Step, data))
    }

    /// The stored form of this step. The root is never stored.
    pub fn to_stored_object(&self) -> ChainResult<StoredObject> {
        let parent = self.parent.ok_or_else(|| ChainError::CorruptStep {
            id: self.id,
            reason: "the root step has no stored form".into(),
        })?;
        Self::encode(&StepRecord {
            parent,
            content: self.content,
            diff: self.diff.clone(),
        })
    }

    /// Decode a stored step record.
    pub fn from_stored_object(obj: &StoredObject) -> ChainResult<Self> {
        let id = obj.compute_id();
        obj.expect_kind(ObjectKind::Step)?;
        let record: StepRecord =
            serde_json::from_slice(&obj.data).map_err(|e| ChainError::CorruptStep {
                id,
                reason: e.to_string(),
            })?;
        Ok(Self {
            id,
            parent: Some(record.parent),
            content: record.content,
            diff: record.diff,
        })
    }
}

/// A step that has been computed but not yet linked into a chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingStep {
    pub actions: ActionList,
    pub diff: StepDiff,
}

impl PendingStep {
    pub fn new(actions: ActionList, diff: StepDiff) -> Self {
        Self { actions, diff }
    }
}
