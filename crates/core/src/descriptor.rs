use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// Metadata describing a widget, as found in its `widget.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    pub name: String,
    pub integration: Integration,
    /// JSON schema of the widget's feature configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<String>,
}

impl WidgetDescriptor {
    pub fn new(name: impl Into<String>, kind: IntegrationKind, technology: Technology) -> Self {
        Self {
            name: name.into(),
            integration: Integration { kind, technology },
            features: None,
            controls: Vec::new(),
        }
    }

    pub fn with_features(mut self, schema: Value) -> Self {
        self.features = Some(schema);
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_activity(&self) -> bool {
        self.integration.kind == IntegrationKind::Activity
    }

    pub fn technology(&self) -> &Technology {
        &self.integration.technology
    }

    /// Name converted to kebab case, used for template file names and CSS classes.
    pub fn kebab_name(&self) -> String {
        kebab_case(&self.name)
    }
}

/// Converts a camel-case widget name to kebab case (`SomeWidget` becomes `some-widget`).
pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (index, ch) in name.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if index > 0 {
                out.push('-');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    #[serde(rename = "type", default)]
    pub kind: IntegrationKind,
    pub technology: Technology,
}

/// Differentiates between widgets with a DOM representation and activities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationKind {
    #[default]
    Widget,
    Activity,
}

/// Integration technology of a widget; selects the adapter used to instantiate it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Technology {
    Plain,
    Angular,
    Custom(String),
}

impl Technology {
    pub fn as_str(&self) -> &str {
        match self {
            Technology::Plain => "plain",
            Technology::Angular => "angular",
            Technology::Custom(name) => name,
        }
    }
}

impl From<&str> for Technology {
    fn from(value: &str) -> Self {
        match value {
            "plain" => Technology::Plain,
            "angular" => Technology::Angular,
            other => Technology::Custom(other.to_owned()),
        }
    }
}

impl From<String> for Technology {
    fn from(value: String) -> Self {
        match value.as_str() {
            "plain" => Technology::Plain,
            "angular" => Technology::Angular,
            _ => Technology::Custom(value),
        }
    }
}

impl From<Technology> for String {
    fn from(value: Technology) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for Technology {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn descriptor_parses_widget_json() {
        let descriptor = WidgetDescriptor::from_json(
            r#"{
                "name": "SomeWidget",
                "integration": { "type": "activity", "technology": "plain" },
                "features": { "type": "object" }
            }"#,
        )
        .expect("descriptor");
        assert_eq!(descriptor.name, "SomeWidget");
        assert!(descriptor.is_activity());
        assert_eq!(descriptor.technology(), &Technology::Plain);
        assert_eq!(descriptor.features, Some(json!({ "type": "object" })));
    }

    #[rstest]
    #[case("plain", Technology::Plain)]
    #[case("angular", Technology::Angular)]
    #[case("vue", Technology::Custom("vue".into()))]
    fn technology_round_trips_through_strings(#[case] raw: &str, #[case] expected: Technology) {
        let technology = Technology::from(raw);
        assert_eq!(technology, expected);
        assert_eq!(technology.as_str(), raw);
    }

    #[rstest]
    #[case("SomeWidget", "some-widget")]
    #[case("some-widget", "some-widget")]
    #[case("myHTMLWidget", "my-h-t-m-l-widget")]
    fn kebab_name_splits_camel_case(#[case] name: &str, #[case] expected: &str) {
        let descriptor = WidgetDescriptor::new(name, IntegrationKind::Widget, Technology::Plain);
        assert_eq!(descriptor.kebab_name(), expected);
    }
}
