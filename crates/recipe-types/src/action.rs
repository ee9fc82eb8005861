use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single transformation request: an action name plus its raw parameters.
///
/// Parameters stay string-keyed and string-valued here; typing them against
/// a declared schema is the job of the action registry. A `BTreeMap` keeps
/// serialization order stable, which the content hash of an action list
/// depends on.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Action {
    /// Registered action name (e.g. `"uppercase"`, `"copy"`).
    pub name: String,
    /// Raw parameter values keyed by parameter name.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Action {
    /// Create an action with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style parameter setter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Look up a raw parameter value.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }
}
