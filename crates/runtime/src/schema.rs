//! Feature configuration validation against a widget's JSON schema.

use crate::error::{SchemaError, ValidationFailure};
use serde_json::{Map, Value};

/// A compiled feature schema.
pub struct FeatureSchema {
    widget: String,
    schema: Value,
    validator: jsonschema::Validator,
}

impl FeatureSchema {
    pub fn compile(schema: &Value, widget: &str) -> Result<Self, SchemaError> {
        let validator = jsonschema::validator_for(schema).map_err(|err| SchemaError {
            widget: widget.to_owned(),
            message: err.to_string(),
        })?;
        Ok(Self { widget: widget.to_owned(), schema: schema.clone(), validator })
    }

    /// Fills in schema defaults and validates the result.
    ///
    /// Missing properties with a `default` receive it; missing object-typed properties
    /// are created empty so their own defaults apply.
    pub fn validate(&self, features: &Value) -> Result<Value, ValidationFailure> {
        let mut value =
            if features.is_null() { Value::Object(Map::new()) } else { features.clone() };
        apply_defaults(&self.schema, &mut value);

        let issues: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();

        if issues.is_empty() {
            tracing::trace!(widget = %self.widget, "feature configuration valid");
            Ok(value)
        } else {
            tracing::debug!(
                widget = %self.widget,
                issues = issues.len(),
                "feature configuration invalid"
            );
            Err(ValidationFailure { widget: self.widget.clone(), issues })
        }
    }
}

fn is_object_schema(schema: &Value) -> bool {
    match schema.get("type") {
        Some(Value::String(kind)) => kind == "object",
        Some(Value::Array(kinds)) => kinds.iter().any(|kind| kind == "object"),
        _ => schema.get("properties").is_some(),
    }
}

fn apply_defaults(schema: &Value, value: &mut Value) {
    match value {
        Value::Object(object) => {
            if let Some(Value::Object(properties)) = schema.get("properties") {
                for (key, property) in properties {
                    if !object.contains_key(key) {
                        if let Some(default) = property.get("default") {
                            object.insert(key.clone(), default.clone());
                        } else if is_object_schema(property) {
                            object.insert(key.clone(), Value::Object(Map::new()));
                        } else {
                            continue;
                        }
                    }
                    if let Some(child) = object.get_mut(key) {
                        apply_defaults(property, child);
                    }
                }
            }
            if let Some(additional) = schema.get("additionalProperties").filter(|s| s.is_object()) {
                let declared = schema.get("properties").and_then(Value::as_object);
                for (key, child) in object.iter_mut() {
                    if declared.is_none_or(|declared| !declared.contains_key(key)) {
                        apply_defaults(additional, child);
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema.get("items").filter(|s| s.is_object()) {
                for item in items {
                    apply_defaults(item_schema, item);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn schema() -> FeatureSchema {
        FeatureSchema::compile(
            &json!({
                "$schema": "http://json-schema.org/draft-04/schema#",
                "type": "object",
                "properties": {
                    "someFeature": { "type": "string" },
                    "other": {
                        "type": "object",
                        "properties": {
                            "value": { "type": "string", "default": "the-default" }
                        }
                    },
                    "list": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": { "enabled": { "type": "boolean", "default": true } }
                        }
                    }
                }
            }),
            "SomeWidget",
        )
        .expect("valid schema")
    }

    #[rstest]
    fn defaults_fill_missing_nested_objects(schema: FeatureSchema) {
        let features = schema.validate(&json!({ "someFeature": "someValue" })).expect("valid");
        assert_eq!(
            features,
            json!({ "someFeature": "someValue", "other": { "value": "the-default" } })
        );
    }

    #[rstest]
    fn explicit_values_win_over_defaults(schema: FeatureSchema) {
        let features = schema.validate(&json!({ "other": { "value": "ABC" } })).expect("valid");
        assert_eq!(features, json!({ "other": { "value": "ABC" } }));
    }

    #[rstest]
    fn array_items_receive_defaults(schema: FeatureSchema) {
        let features =
            schema.validate(&json!({ "list": [{}, { "enabled": false }] })).expect("valid");
        assert_eq!(features["list"], json!([{ "enabled": true }, { "enabled": false }]));
    }

    #[rstest]
    fn null_configuration_is_treated_as_empty(schema: FeatureSchema) {
        let features = schema.validate(&Value::Null).expect("valid");
        assert_eq!(features, json!({ "other": { "value": "the-default" } }));
    }

    #[rstest]
    fn type_mismatches_are_reported(schema: FeatureSchema) {
        let failure = schema.validate(&json!({ "someFeature": 42 })).expect_err("invalid");
        assert_eq!(failure.widget, "SomeWidget");
        assert_eq!(failure.issues.len(), 1);
        assert!(failure.issues[0].contains("string"), "{:?}", failure.issues);
    }

    #[rstest]
    fn broken_schemas_fail_to_compile() {
        let err = FeatureSchema::compile(&json!({ "type": 12 }), "Broken")
            .err()
            .expect("invalid schema");
        assert_eq!(err.widget, "Broken");
    }
}
