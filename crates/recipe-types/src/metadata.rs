//! Dataset schema as seen at one point of a recipe.

use serde::{Deserialize, Serialize};

use crate::column::ColumnId;
use crate::error::TypeError;

/// One column of a dataset schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadata {
    /// Stable id, unique within the preparation.
    pub id: ColumnId,
    /// Display name.
    pub name: String,
    /// Inferred or declared type (`"string"`, `"integer"`, ...).
    #[serde(rename = "type", default)]
    pub column_type: String,
    /// Semantic domain, empty when unknown.
    #[serde(default)]
    pub domain: String,
}

impl ColumnMetadata {
    pub fn new(id: ColumnId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            column_type: "string".into(),
            domain: String::new(),
        }
    }

    pub fn with_type(mut self, column_type: impl Into<String>) -> Self {
        self.column_type = column_type.into();
        self
    }
}

/// Ordered column list plus the column-id allocation counter.
///
/// The counter never falls below `max(existing ids) + 1`, and it survives
/// column deletion: once an id has been handed out it is never handed out
/// again by the same schema lineage. The counter is wider than a column id
/// so that handing out `u32::MAX` leaves it exhausted instead of wrapping.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMetadata {
    columns: Vec<ColumnMetadata>,
    #[serde(default)]
    next_id: u64,
}

impl RowMetadata {
    /// Build a schema from an ordered column list.
    pub fn new(columns: Vec<ColumnMetadata>) -> Self {
        let next_id = columns
            .iter()
            .map(|c| u64::from(c.id.value()) + 1)
            .max()
            .unwrap_or(0);
        Self { columns, next_id }
    }

    /// A schema with no columns.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, id: ColumnId) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: ColumnId) -> bool {
        self.get(id).is_some()
    }

    /// Index of a column in display order.
    pub fn position(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == id)
    }

    /// Ids in display order.
    pub fn ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.id).collect()
    }

    /// Highest id currently present.
    pub fn max_id(&self) -> Option<ColumnId> {
        self.columns.iter().map(|c| c.id).max()
    }

    /// The id the next allocated column will receive.
    ///
    /// Fails once `u32::MAX` has been handed out.
    pub fn next_column_id(&self) -> Result<ColumnId, TypeError> {
        let after_max = self.max_id().map(|id| u64::from(id.value()) + 1).unwrap_or(0);
        let next = self.next_id.max(after_max);
        u32::try_from(next)
            .map(ColumnId::new)
            .map_err(|_| TypeError::ColumnIdOutOfRange { id: u32::MAX, delta: 1 })
    }

    /// Allocate a new column.
    ///
    /// The column is placed right after `after` when that column exists,
    /// otherwise at the end of the schema. Returns the allocated id, or an
    /// error when the id space is used up; the schema is untouched then.
    pub fn allocate(
        &mut self,
        name: impl Into<String>,
        column_type: impl Into<String>,
        after: Option<ColumnId>,
    ) -> Result<ColumnId, TypeError> {
        let id = self.next_column_id()?;
        let column = ColumnMetadata::new(id, name).with_type(column_type);
        match after.and_then(|anchor| self.position(anchor)) {
            Some(index) => self.columns.insert(index + 1, column),
            None => self.columns.push(column),
        }
        self.next_id = u64::from(id.value()) + 1;
        Ok(id)
    }

    /// Remove a column, returning it if it existed.
    pub fn remove(&mut self, id: ColumnId) -> Option<ColumnMetadata> {
        let index = self.position(id)?;
        Some(self.columns.remove(index))
    }

    /// Rename a column in place. Returns `false` if the column is absent.
    pub fn rename(&mut self, id: ColumnId, name: impl Into<String>) -> bool {
        match self.columns.iter_mut().find(|c| c.id == id) {
            Some(column) => {
                column.name = name.into();
                true
            }
            None => false,
        }
    }
}
