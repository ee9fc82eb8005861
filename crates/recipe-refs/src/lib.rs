//! Preparation pointers for recipe histories.
//!
//! A [`Preparation`] is the only mutable object of the history model: a
//! named pointer to the head step of a chain plus the initial schema that
//! chain applies to. Everything it points to is immutable.
//!
//! # Modules
//!
//! - [`error`]: Error types for preparation storage and locking
//! - [`types`]: [`Preparation`], [`PreparationId`], [`NewPreparation`]
//! - [`traits`]: [`PreparationRepository`] and [`PreparationLocker`]
//! - [`memory`]: In-memory backends for both traits

pub mod error;
pub mod memory;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::{InMemoryPreparationLocker, InMemoryPreparationRepository};
pub use traits::{PreparationLocker, PreparationRepository};
pub use types::{NewPreparation, Preparation, PreparationId};
