//! Model configuration.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Names and switches that shape resolution and mutation.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// let cfg = propgraph::ModelConfig::from_json(r#"{ "auto_reorder": false }"#).unwrap();
/// assert_eq!(cfg.extra_block, "ext");
/// assert!(!cfg.auto_reorder);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Block whose members are visible unqualified from the enclosing block.
    pub extra_block: String,
    /// Prefix that restarts lookup at the file's root block.
    pub project_alias: String,
    /// Prefix that restarts lookup at the topmost parent file.
    pub root_project_alias: String,
    /// Reorder declarations after each mutation so targets precede their
    /// dependents.
    pub auto_reorder: bool,
    /// How many references a path may follow while descending, e.g. in
    /// `alias[0]` where `alias = other`.
    pub max_reference_depth: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            extra_block: "ext".to_string(),
            project_alias: "project".to_string(),
            root_project_alias: "rootProject".to_string(),
            auto_reorder: true,
            max_reference_depth: 32,
        }
    }
}

impl ModelConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
