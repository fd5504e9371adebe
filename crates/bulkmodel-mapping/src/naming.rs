//! Flattened column naming.

use serde::{Deserialize, Serialize};

/// Turns an owned-navigation path and a leaf property into a column name.
///
/// Every column is named by its full path, so `FirstNested.SecondNested.Prop`
/// becomes `FirstNested_SecondNested_Prop`; root-level properties keep their
/// bare name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub separator: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            separator: "_".to_string(),
        }
    }
}

impl NamingConvention {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    pub fn column_name(&self, path: &[&str], leaf: &str) -> String {
        let mut name = String::new();
        for segment in path {
            name.push_str(segment);
            name.push_str(&self.separator);
        }
        name.push_str(leaf);
        name
    }
}
