use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, HistoryResult};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Stamped on every preparation this process creates.
    pub app_version: String,
    /// Identity presented to the lock service.
    pub lock_owner: String,
    /// Persist the truncated head when a chain resolves with missing objects.
    pub heal_broken_chains: bool,
    /// Longest history append and copy accept.
    pub max_steps: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            lock_owner: "recipe-history".to_string(),
            heal_broken_chains: true,
            max_steps: 10_000,
        }
    }
}

impl HistoryConfig {
    pub fn from_toml_str(source: &str) -> HistoryResult<Self> {
        toml::from_str(source).map_err(|e| HistoryError::Config(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> HistoryResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| HistoryError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }
}
