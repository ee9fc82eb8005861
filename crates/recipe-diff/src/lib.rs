//! Diff engine and column id shifter for recipe histories.
//!
//! Column ids are allocated in history order, so any structural change in
//! the middle of a recipe renumbers the columns created after it.
//!
//! # Key Types
//!
//! - [`StepDiffEngine`] -- simulates a step's actions against a schema and
//!   reports the column ids it creates and deletes
//! - [`ColumnMapping`] -- how column ids of an old history translate to a
//!   rewritten one
//! - [`ColumnIdShifter`] -- rewrites and recomputes the steps after a change

pub mod engine;
pub mod error;
pub mod mapping;
pub mod shifter;

pub use engine::StepDiffEngine;
pub use error::{ConflictReason, DiffError, DiffResult};
pub use mapping::ColumnMapping;
pub use recipe_chain::PendingStep;
pub use shifter::{ColumnIdShifter, Rebased};
