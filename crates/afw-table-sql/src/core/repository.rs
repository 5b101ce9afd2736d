//! Repository configuration stored alongside catalogs.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Configuration of a data repository.
///
/// Fields other than `root` and `mapper` are opaque to this crate and are
/// persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryCfg {
    pub root: Option<String>,
    pub mapper: Option<String>,
    #[serde(default)]
    pub mapper_args: JsonValue,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub policy: JsonValue,
}

impl RepositoryCfg {
    pub fn new(root: impl Into<String>, mapper: impl Into<String>) -> Self {
        Self {
            root: Some(root.into()),
            mapper: Some(mapper.into()),
            ..Default::default()
        }
    }
}
