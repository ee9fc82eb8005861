//! Action registry for recipe histories.
//!
//! The catalog of transformations itself lives outside this workspace. What
//! the history model needs from it is narrower: for a named action, the
//! parameter schema and the *column effects* (which columns it reads,
//! creates, deletes, or renames) given its parameters and the schema it is
//! applied to.
//!
//! - [`ActionDescriptor`] -- one action's schema and column effects
//! - [`ActionRegistry`] -- name to descriptor resolution
//! - [`ActionParameters`] -- parameters typed against a [`ParameterSchema`];
//!   values outside the schema are kept as [`ParameterValue::Unknown`]
//! - [`DeclaredAction`] / [`StaticActionRegistry`] -- data-driven descriptors
//!   and an in-process registry preloaded with common actions

pub mod declared;
pub mod descriptor;
pub mod error;
pub mod parameters;
pub mod registry;

pub use declared::{ColumnTemplate, Creates, DeclaredAction, MAX_REPEATED_COLUMNS};
pub use descriptor::{ActionDescriptor, ColumnEffects, NewColumn, PassThroughAction};
pub use error::{ActionError, ActionResult};
pub use parameters::{
    ActionParameters, ParameterKind, ParameterSchema, ParameterSpec, ParameterValue, Scope,
};
pub use registry::{ActionRegistry, StaticActionRegistry};
