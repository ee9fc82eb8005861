//! Foundation types for recipe histories.
//!
//! A *recipe* is the ordered list of transformation steps a preparation
//! applies to a dataset. This crate provides the identity and structural
//! types every other recipe crate depends on.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Content-addressed identifier (BLAKE3 hash)
//! - [`ColumnId`]: Zero-padded column identifier scoped to one preparation
//! - [`Action`]: A named transformation with string parameters
//! - [`RowMetadata`] / [`ColumnMetadata`]: Dataset schema at a point in history

pub mod action;
pub mod column;
pub mod error;
pub mod metadata;
pub mod object;

pub use action::Action;
pub use column::ColumnId;
pub use error::TypeError;
pub use metadata::{ColumnMetadata, RowMetadata};
pub use object::ObjectId;
