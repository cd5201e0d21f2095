//! Accumulates the feature configuration of the widget under test.

use crate::error::HarnessError;
use json_dotpath::DotPaths;
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureConfiguration {
    tree: Value,
}

impl Default for FeatureConfiguration {
    fn default() -> Self {
        Self { tree: Value::Object(Map::new()) }
    }
}

impl FeatureConfiguration {
    /// Replaces the whole tree.
    pub fn configure_all(&mut self, features: Value) {
        self.tree = features;
    }

    /// Sets `value` at the dotted `path`, creating intermediate objects. Other
    /// paths keep their values.
    pub fn configure(&mut self, path: &str, value: Value) -> Result<(), HarnessError> {
        if !self.tree.is_object() {
            self.tree = Value::Object(Map::new());
        }
        self.tree.dot_set(path, value).map_err(|err| HarnessError::InvalidPath {
            path: path.to_owned(),
            message: err.to_string(),
        })
    }

    pub fn value(&self) -> &Value {
        &self.tree
    }
}
