//! Data-driven action descriptors.
//!
//! Most actions differ only in *how many* columns they create and what they
//! are called; [`DeclaredAction`] captures that shape as data instead of one
//! hand-written descriptor per action.

use recipe_types::{ColumnId, RowMetadata};

use crate::descriptor::{ActionDescriptor, ColumnEffects, NewColumn};
use crate::error::{ActionError, ActionResult};
use crate::parameters::{ActionParameters, ParameterKind, ParameterSchema, ParameterSpec};

/// One column created with a fixed suffix on the target column name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnTemplate {
    pub suffix: String,
    /// Type of the new column; `None` inherits the target column's type.
    pub column_type: Option<String>,
}

impl ColumnTemplate {
    pub fn inherit(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            column_type: None,
        }
    }

    pub fn typed(suffix: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            column_type: Some(column_type.into()),
        }
    }
}

/// Upper bound on the columns a [`Creates::Repeated`] action may create.
pub const MAX_REPEATED_COLUMNS: i64 = 1024;

/// How many columns an action creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Creates {
    Nothing,
    /// A fixed list of columns, one per template.
    Suffixed(Vec<ColumnTemplate>),
    /// `n` string columns where `n` comes from an integer parameter,
    /// `1 <= n <= MAX_REPEATED_COLUMNS`.
    Repeated {
        parameter: String,
        default: i64,
        suffix: String,
    },
}

/// An action described by its schema and column shape.
#[derive(Clone, Debug)]
pub struct DeclaredAction {
    name: String,
    schema: ParameterSchema,
    creates: Creates,
    deletes_target: bool,
    rename_parameter: Option<String>,
}

impl DeclaredAction {
    /// An action that reads its target column and changes values only.
    pub fn column_op(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: ParameterSchema::implicit(),
            creates: Creates::Nothing,
            deletes_target: false,
            rename_parameter: None,
        }
    }

    /// `copy`: duplicates the target next to itself.
    pub fn copy() -> Self {
        Self::column_op("copy").creating(Creates::Suffixed(vec![ColumnTemplate::inherit("_copy")]))
    }

    /// `split`: splits the target into `limit` columns (2 by default).
    pub fn split() -> Self {
        Self::column_op("split")
            .with_parameter(ParameterSpec::optional("limit", ParameterKind::Integer))
            .creating(Creates::Repeated {
                parameter: "limit".into(),
                default: 2,
                suffix: "_split".into(),
            })
    }

    /// `extract_url_tokens`: protocol, host and port of a URL column.
    pub fn extract_url_tokens() -> Self {
        Self::column_op("extract_url_tokens").creating(Creates::Suffixed(vec![
            ColumnTemplate::typed("_protocol", "string"),
            ColumnTemplate::typed("_host", "string"),
            ColumnTemplate::typed("_port", "integer"),
        ]))
    }

    /// `delete_column`: removes the target.
    pub fn delete_column() -> Self {
        let mut action = Self::column_op("delete_column");
        action.deletes_target = true;
        action
    }

    /// `rename_column`: renames the target to `new_column_name`.
    pub fn rename_column() -> Self {
        let mut action = Self::column_op("rename_column")
            .with_parameter(ParameterSpec::required("new_column_name", ParameterKind::Text));
        action.rename_parameter = Some("new_column_name".into());
        action
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.schema = self.schema.with(spec);
        self
    }

    pub fn creating(mut self, creates: Creates) -> Self {
        self.creates = creates;
        self
    }

    fn target<'a>(
        &self,
        params: &ActionParameters,
        schema: &'a RowMetadata,
    ) -> ActionResult<Option<(ColumnId, &'a str, &'a str)>> {
        let Some(id) = params.column_id() else {
            return Ok(None);
        };
        let column = schema.get(id).ok_or_else(|| ActionError::UnknownColumn {
            action: self.name.clone(),
            column: id,
        })?;
        Ok(Some((id, column.name.as_str(), column.column_type.as_str())))
    }

    fn require_target(&self, target: Option<ColumnId>) -> ActionResult<ColumnId> {
        target.ok_or_else(|| ActionError::MissingScope {
            action: self.name.clone(),
            reason: "a target column is required".into(),
        })
    }
}

impl ActionDescriptor for DeclaredAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    fn column_effects(
        &self,
        params: &ActionParameters,
        schema: &RowMetadata,
    ) -> ActionResult<ColumnEffects> {
        let target = self.target(params, schema)?;
        let target_id = target.map(|(id, _, _)| id);
        let base_name = target.map(|(_, name, _)| name).unwrap_or(self.name.as_str());
        let base_type = target.map(|(_, _, ty)| ty).unwrap_or("string");

        let creates = match &self.creates {
            Creates::Nothing => Vec::new(),
            Creates::Suffixed(templates) => templates
                .iter()
                .map(|t| {
                    NewColumn::new(
                        format!("{base_name}{}", t.suffix),
                        t.column_type.as_deref().unwrap_or(base_type),
                    )
                })
                .collect(),
            Creates::Repeated {
                parameter,
                default,
                suffix,
            } => {
                let count = params.integer(parameter).unwrap_or(*default);
                if !(1..=MAX_REPEATED_COLUMNS).contains(&count) {
                    return Err(ActionError::InvalidParameter {
                        action: self.name.clone(),
                        parameter: parameter.clone(),
                        reason: format!("must be between 1 and {MAX_REPEATED_COLUMNS}, got {count}"),
                    });
                }
                (1..=count)
                    .map(|i| NewColumn::new(format!("{base_name}{suffix}_{i}"), "string"))
                    .collect()
            }
        };

        let mut effects = ColumnEffects {
            reads: params.referenced_columns(),
            insert_after: if creates.is_empty() { None } else { target_id },
            creates,
            ..ColumnEffects::default()
        };
        if self.deletes_target {
            effects.deletes.push(self.require_target(target_id)?);
        }
        if let Some(parameter) = &self.rename_parameter {
            let column = self.require_target(target_id)?;
            let new_name = params.text(parameter).unwrap_or_default();
            effects.renames.push((column, new_name.to_string()));
        }
        Ok(effects)
    }
}
