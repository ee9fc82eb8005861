//! Typed action parameters.
//!
//! Raw actions carry `String -> String` parameter maps. A [`ParameterSchema`]
//! turns them into [`ActionParameters`]: the scope is checked, declared
//! parameters are parsed into their kind, and anything the schema does not
//! know is preserved untouched as [`ParameterValue::Unknown`] so newer
//! clients can round-trip parameters older registries do not understand.

use std::collections::BTreeMap;

use serde_json::Value;

use recipe_types::{Action, ColumnId};

use crate::error::{ActionError, ActionResult};

/// Parameter naming the scope an action applies to.
pub const SCOPE: &str = "scope";
/// Parameter naming the target column.
pub const COLUMN_ID: &str = "column_id";
/// Parameter naming the target column by display name.
pub const COLUMN_NAME: &str = "column_name";
/// Parameter naming the target row.
pub const ROW_ID: &str = "row_id";
/// JSON filter restricting the rows an action applies to.
pub const FILTER: &str = "filter";

/// What an action applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    Column,
    Cell,
    Line,
    Dataset,
}

impl Scope {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "column" => Some(Self::Column),
            "cell" => Some(Self::Cell),
            "line" => Some(Self::Line),
            "dataset" => Some(Self::Dataset),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Column => "column",
            Self::Cell => "cell",
            Self::Line => "line",
            Self::Dataset => "dataset",
        }
    }

    fn needs_column(&self) -> bool {
        matches!(self, Self::Column | Self::Cell)
    }

    fn needs_row(&self) -> bool {
        matches!(self, Self::Line | Self::Cell)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared kind of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParameterKind {
    /// A column id; rewritten when column ids shift.
    Column,
    Integer,
    Text,
    Boolean,
    /// A JSON filter tree whose `"field"` members are column ids.
    Filter,
}

/// One declared parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParameterKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Declared parameters of one action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterSchema {
    specs: Vec<ParameterSpec>,
}

impl ParameterSchema {
    /// The parameters every action accepts: target column, row, and filter.
    pub fn implicit() -> Self {
        Self {
            specs: vec![
                ParameterSpec::optional(COLUMN_ID, ParameterKind::Column),
                ParameterSpec::optional(COLUMN_NAME, ParameterKind::Text),
                ParameterSpec::optional(ROW_ID, ParameterKind::Text),
                ParameterSpec::optional(FILTER, ParameterKind::Filter),
            ],
        }
    }

    /// Add a parameter, replacing any spec with the same name.
    pub fn with(mut self, spec: ParameterSpec) -> Self {
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec);
        self
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Type the raw parameters of `action` against this schema.
    pub fn parse(&self, action: &Action) -> ActionResult<ActionParameters> {
        let raw_scope = action
            .parameter(SCOPE)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ActionError::MissingScope {
                action: action.name.clone(),
                reason: "no scope designated".into(),
            })?;
        let scope = Scope::parse(raw_scope).ok_or_else(|| ActionError::InvalidParameter {
            action: action.name.clone(),
            parameter: SCOPE.into(),
            reason: format!("unknown scope {raw_scope:?}"),
        })?;

        let mut values = BTreeMap::new();
        for (key, raw) in &action.parameters {
            if key == SCOPE {
                continue;
            }
            let value = match self.spec(key) {
                Some(spec) => match parse_value(spec.kind, raw) {
                    Ok(Some(value)) => value,
                    Ok(None) => continue,
                    Err(reason) => {
                        return Err(ActionError::InvalidParameter {
                            action: action.name.clone(),
                            parameter: key.clone(),
                            reason,
                        })
                    }
                },
                None => ParameterValue::Unknown(raw.clone()),
            };
            values.insert(key.clone(), value);
        }

        if let Some(missing) = self
            .specs
            .iter()
            .find(|spec| spec.required && !values.contains_key(&spec.name))
        {
            return Err(ActionError::MissingParameter {
                action: action.name.clone(),
                parameter: missing.name.clone(),
            });
        }

        let params = ActionParameters { scope, values };
        if scope.needs_column() && params.column_id().is_none() {
            return Err(ActionError::MissingScope {
                action: action.name.clone(),
                reason: format!("{scope} scope without {COLUMN_ID}"),
            });
        }
        if scope.needs_row() && params.text(ROW_ID).is_none() {
            return Err(ActionError::MissingScope {
                action: action.name.clone(),
                reason: format!("{scope} scope without {ROW_ID}"),
            });
        }
        Ok(params)
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::implicit()
    }
}

fn parse_value(kind: ParameterKind, raw: &str) -> Result<Option<ParameterValue>, String> {
    let trimmed = raw.trim();
    match kind {
        ParameterKind::Text => Ok(Some(ParameterValue::Text(raw.to_string()))),
        _ if trimmed.is_empty() => Ok(None),
        ParameterKind::Column => ColumnId::parse(trimmed)
            .map(|id| Some(ParameterValue::Column(id)))
            .map_err(|e| e.to_string()),
        ParameterKind::Integer => trimmed
            .parse::<i64>()
            .map(|n| Some(ParameterValue::Integer(n)))
            .map_err(|e| e.to_string()),
        ParameterKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(Some(ParameterValue::Boolean(true))),
            "false" => Ok(Some(ParameterValue::Boolean(false))),
            other => Err(format!("expected true or false, got {other:?}")),
        },
        ParameterKind::Filter => serde_json::from_str::<Value>(trimmed)
            .map(|tree| Some(ParameterValue::Filter(tree)))
            .map_err(|e| e.to_string()),
    }
}

/// A typed parameter value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParameterValue {
    Column(ColumnId),
    Integer(i64),
    Text(String),
    Boolean(bool),
    Filter(Value),
    /// Not declared by the schema; kept verbatim.
    Unknown(String),
}

/// Parameters of one action, typed against its schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionParameters {
    scope: Scope,
    values: BTreeMap<String, ParameterValue>,
}

impl ActionParameters {
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.get(name)
    }

    /// The target column, if any.
    pub fn column_id(&self) -> Option<ColumnId> {
        match self.values.get(COLUMN_ID) {
            Some(ParameterValue::Column(id)) => Some(*id),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParameterValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParameterValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParameterValue::Boolean(b)) => Some(*b),
            _ => None,
        }
    }

    /// Every column id these parameters mention, in first-seen order.
    pub fn referenced_columns(&self) -> Vec<ColumnId> {
        let mut columns = Vec::new();
        for value in self.values.values() {
            match value {
                ParameterValue::Column(id) => columns.push(*id),
                ParameterValue::Filter(tree) => collect_filter_fields(tree, &mut columns),
                _ => {}
            }
        }
        let mut seen = std::collections::HashSet::new();
        columns.retain(|id| seen.insert(*id));
        columns
    }

    /// Rewrite every column reference of `action` through `map`.
    ///
    /// Only parameters whose ids actually change are re-rendered; all other
    /// raw values are left byte-for-byte as they were.
    pub fn remap_columns<F, E>(&self, action: &Action, mut map: F) -> Result<Action, E>
    where
        F: FnMut(ColumnId) -> Result<ColumnId, E>,
    {
        let mut rewritten = action.clone();
        for (key, value) in &self.values {
            match value {
                ParameterValue::Column(id) => {
                    let mapped = map(*id)?;
                    if mapped != *id {
                        rewritten.parameters.insert(key.clone(), mapped.to_string());
                    }
                }
                ParameterValue::Filter(tree) => {
                    let mut tree = tree.clone();
                    if remap_filter_fields(&mut tree, &mut map)? {
                        rewritten.parameters.insert(key.clone(), tree.to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(rewritten)
    }
}

fn collect_filter_fields(tree: &Value, out: &mut Vec<ColumnId>) {
    match tree {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::String(raw) if key == "field" => {
                        if let Ok(id) = ColumnId::parse(raw) {
                            out.push(id);
                        }
                    }
                    other => collect_filter_fields(other, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_filter_fields(item, out)),
        _ => {}
    }
}

fn remap_filter_fields<F, E>(tree: &mut Value, map: &mut F) -> Result<bool, E>
where
    F: FnMut(ColumnId) -> Result<ColumnId, E>,
{
    let mut changed = false;
    match tree {
        Value::Object(entries) => {
            for (key, value) in entries.iter_mut() {
                match value {
                    Value::String(raw) if key == "field" => {
                        if let Ok(id) = ColumnId::parse(raw) {
                            let mapped = map(id)?;
                            if mapped != id {
                                *raw = mapped.to_string();
                                changed = true;
                            }
                        }
                    }
                    other => changed |= remap_filter_fields(other, map)?,
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                changed |= remap_filter_fields(item, map)?;
            }
        }
        _ => {}
    }
    Ok(changed)
}
