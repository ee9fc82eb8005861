//! Content-addressed storage for recipe histories.
//!
//! Two kinds of objects live here: [`ActionList`]s and the step records
//! encoded by `recipe-chain`. Each is keyed by a BLAKE3 hash taken in its
//! own domain ([`ContentHasher`]), so preparations applying the same actions
//! share one stored list.
//!
//! Objects are written before any preparation points at them and never
//! change afterwards. [`InMemoryContentStore`] is the backend used by tests
//! and by the CLI.

pub mod error;
pub mod hasher;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use memory::InMemoryContentStore;
pub use object::{ActionList, ObjectKind, StoredObject};
pub use traits::ContentStore;
