use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::SchemaError;
use crate::types::{BooleanMode, SelectMode};

/// Global defaults applied beneath every per-attribute declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalConfig {
    pub locale: String,
    pub date_format: String,
    pub time_format: String,
    pub datetime_format: String,
    /// Models at this depth are built as leaves.
    pub max_nesting_depth: usize,
    pub search_case_sensitive: bool,
    pub search_prefix_only: bool,
    pub decimal_precision: u8,
    pub use_thousands_grouping: bool,
    pub boolean_mode: BooleanMode,
    pub enum_select_mode: SelectMode,
    /// Key of the synthesized group holding unassigned attributes.
    pub default_group: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            locale: "en".into(),
            date_format: "dd-MM-yyyy".into(),
            time_format: "HH:mm:ss".into(),
            datetime_format: "dd-MM-yyyy HH:mm:ss".into(),
            max_nesting_depth: 3,
            search_case_sensitive: false,
            search_prefix_only: false,
            decimal_precision: 2,
            use_thousands_grouping: true,
            boolean_mode: BooleanMode::Checkbox,
            enum_select_mode: SelectMode::Combo,
            default_group: "default".into(),
        }
    }
}

impl GlobalConfig {
    pub fn from_yaml_str(content: &str, origin: &str) -> Result<Self, SchemaError> {
        serde_yaml::from_str(content).map_err(|source| SchemaError::Yaml {
            origin: origin.to_string(),
            source,
        })
    }

    pub fn from_json_str(content: &str, origin: &str) -> Result<Self, SchemaError> {
        serde_json::from_str(content).map_err(|source| SchemaError::Json {
            origin: origin.to_string(),
            source,
        })
    }

    /// Load from a `.json` file, or YAML for any other extension.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: origin.clone(),
            source,
        })?;
        if path.extension().is_some_and(|e| e == "json") {
            Self::from_json_str(&content, &origin)
        } else {
            Self::from_yaml_str(&content, &origin)
        }
    }
}
