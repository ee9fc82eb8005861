use std::sync::LazyLock;

use recipe_types::{ColumnId, RowMetadata};

use crate::error::ActionResult;
use crate::parameters::{ActionParameters, ParameterSchema};

/// A column an action introduces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewColumn {
    pub name: String,
    pub column_type: String,
}

impl NewColumn {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// What one action does to the schema it is applied to.
///
/// Created columns are listed in the order the action declares them; ids are
/// assigned by the diff engine, not by the descriptor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnEffects {
    /// Columns that must exist before the action runs.
    pub reads: Vec<ColumnId>,
    /// Columns introduced, in declaration order.
    pub creates: Vec<NewColumn>,
    /// Where the first created column goes; `None` appends at the end.
    pub insert_after: Option<ColumnId>,
    /// Columns removed.
    pub deletes: Vec<ColumnId>,
    /// Columns renamed in place.
    pub renames: Vec<(ColumnId, String)>,
}

impl ColumnEffects {
    /// Effects of an action that only reads.
    pub fn reading(reads: Vec<ColumnId>) -> Self {
        Self {
            reads,
            ..Self::default()
        }
    }

    pub fn is_structural(&self) -> bool {
        !self.creates.is_empty() || !self.deletes.is_empty()
    }
}

/// One action as seen by the history model.
pub trait ActionDescriptor: Send + Sync {
    /// The action name this descriptor answers for.
    fn name(&self) -> &str;

    /// Parameters the action declares.
    fn schema(&self) -> &ParameterSchema;

    /// Column effects of applying the action with `params` to `schema`.
    fn column_effects(
        &self,
        params: &ActionParameters,
        schema: &RowMetadata,
    ) -> ActionResult<ColumnEffects>;
}

/// Descriptor used for actions the registry does not know.
///
/// Reads whatever its implicit parameters reference and leaves the schema
/// shape alone.
#[derive(Debug)]
pub struct PassThroughAction {
    schema: ParameterSchema,
}

static PASS_THROUGH: LazyLock<PassThroughAction> = LazyLock::new(|| PassThroughAction {
    schema: ParameterSchema::implicit(),
});

impl PassThroughAction {
    pub fn shared() -> &'static PassThroughAction {
        &PASS_THROUGH
    }
}

impl ActionDescriptor for PassThroughAction {
    fn name(&self) -> &str {
        "*"
    }

    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    fn column_effects(
        &self,
        params: &ActionParameters,
        _schema: &RowMetadata,
    ) -> ActionResult<ColumnEffects> {
        Ok(ColumnEffects::reading(params.referenced_columns()))
    }
}
