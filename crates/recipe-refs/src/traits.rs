//! Storage and locking interfaces for preparations.

use crate::error::Result;
use crate::types::{Preparation, PreparationId};

/// Storage backend for preparation pointers.
///
/// Implementations must be thread-safe and make each call atomic.
pub trait PreparationRepository: Send + Sync {
    /// Read a preparation. Returns `Ok(None)` if it does not exist.
    fn get(&self, id: &PreparationId) -> Result<Option<Preparation>>;

    /// Store a new preparation. Fails if the id is taken.
    fn insert(&self, preparation: &Preparation) -> Result<()>;

    /// Replace an existing preparation. Fails if it does not exist.
    fn update(&self, preparation: &Preparation) -> Result<()>;

    /// Delete a preparation. Returns `true` if it existed.
    fn remove(&self, id: &PreparationId) -> Result<bool>;

    /// Every stored preparation, ordered by id.
    fn list(&self) -> Result<Vec<Preparation>>;

    /// `true` if the preparation exists.
    fn exists(&self, id: &PreparationId) -> Result<bool> {
        Ok(self.get(id)?.is_some())
    }
}

/// Preparation-scoped exclusive locks.
///
/// Locking is idempotent for the same owner and releasing a lock that is
/// not held is not an error.
pub trait PreparationLocker: Send + Sync {
    /// Take the lock for `owner`. Fails with `Locked` if another owner holds it.
    fn lock(&self, preparation: &PreparationId, owner: &str) -> Result<()>;

    /// Release the lock if `owner` holds it.
    fn unlock(&self, preparation: &PreparationId, owner: &str) -> Result<()>;

    /// Current holder, if any.
    fn holder(&self, preparation: &PreparationId) -> Result<Option<String>>;
}
