//! Step chains for recipe histories.
//!
//! A preparation's history is a singly-linked list of immutable [`Step`]s,
//! each pointing to its parent by content id and ending at the well-known
//! [`ROOT_STEP`]. Changing anything in the middle of a chain produces new
//! steps for everything after the change; existing steps are never touched.
//!
//! [`StepChain`] reads and writes chains through a
//! [`ContentStore`](recipe_store::ContentStore). Resolution is self-healing:
//! a chain whose objects went missing resolves to its longest intact prefix.

pub mod chain;
pub mod error;
pub mod step;

pub use chain::{ChainLink, ChainResolution, StepChain};
pub use error::{ChainError, ChainResult};
pub use step::{PendingStep, Step, StepDiff, StepId, ROOT_STEP};
