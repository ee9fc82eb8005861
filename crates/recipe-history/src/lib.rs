//! Transactional history mutations for recipe preparations.
//!
//! [`HistoryMutator`] is the façade clients use. Every structural mutation
//! follows the same shape:
//!
//! 1. take the preparation lock,
//! 2. resolve the current chain (healing it if objects went missing),
//! 3. compute the rewritten steps without writing anything,
//! 4. persist the new steps, and only then
//! 5. move the preparation head.
//!
//! A mutation that fails at any point before step 5 leaves the preparation
//! exactly as it was.

pub mod config;
pub mod details;
pub mod error;
pub mod guard;
pub mod mutator;

#[cfg(test)]
mod scenarios;

pub use config::HistoryConfig;
pub use details::{CascadeOutcome, GcReport, PreparationDetails, StepDetails};
pub use error::{ErrorKind, HistoryError, HistoryResult};
pub use guard::MutationGuard;
pub use mutator::HistoryMutator;
