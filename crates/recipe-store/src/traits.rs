use recipe_types::ObjectId;

use crate::error::StoreResult;
use crate::object::{ObjectKind, StoredObject};

/// Where action lists and step records live.
///
/// Writing the same bytes twice yields the same id and stores nothing new.
/// Nothing is ever overwritten; objects only disappear through `remove`,
/// which the history layer calls for garbage collection and for cleaning up
/// after a failed mutation.
pub trait ContentStore: Send + Sync {
    /// `Ok(None)` when no object has this id.
    fn get(&self, id: &ObjectId) -> StoreResult<Option<StoredObject>>;

    fn put(&self, object: &StoredObject) -> StoreResult<ObjectId>;

    fn exists(&self, id: &ObjectId) -> StoreResult<bool>;

    /// `true` if the object was present.
    fn remove(&self, id: &ObjectId) -> StoreResult<bool>;

    /// Ids of every object of `kind`, sorted.
    fn list(&self, kind: ObjectKind) -> StoreResult<Vec<ObjectId>>;
}
