//! Declarative schema for provider configuration and resource state.
//!
//! The host checks JSON against these shapes once, at the boundary (see
//! [`crate::validation`]); past that point state travels as a typed
//! [`UserRecord`](crate::resource::UserRecord).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shape of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A JSON string.
    String,
    /// A JSON array whose elements all share one shape.
    List(Box<AttributeType>),
    /// A JSON object with named fields.
    Object(BTreeMap<String, AttributeType>),
}

impl AttributeType {
    /// List of `element`.
    pub fn list(element: AttributeType) -> Self {
        Self::List(Box::new(element))
    }

    /// Object built from `(field, shape)` pairs.
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, AttributeType)>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, shape)| (name.to_string(), shape))
            .collect();
        Self::Object(fields)
    }
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set in configuration.
    Required,
    /// May be set in configuration.
    Optional,
    /// Only ever set by the provider.
    Computed,
    /// Set by the provider unless configuration sets it.
    OptionalComputed,
}

/// One attribute of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value shape.
    #[serde(rename = "type")]
    pub kind: AttributeType,
    /// Who supplies the value.
    pub presence: Presence,
    /// Hide the value from logs and plan output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Attribute {
    /// Attribute of shape `kind` supplied as described by `presence`.
    pub fn new(kind: AttributeType, presence: Presence) -> Self {
        Self {
            kind,
            presence,
            sensitive: false,
            description: None,
        }
    }

    /// `Required` string.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    /// `Optional` string.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    /// `Computed` string.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the value as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether configuration must supply a value.
    pub fn is_required(&self) -> bool {
        self.presence == Presence::Required
    }

    /// Whether only the provider sets this attribute.
    pub fn is_computed_only(&self) -> bool {
        self.presence == Presence::Computed
    }
}

/// Attribute set of a resource or of the provider configuration block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped whenever the stored state layout changes.
    #[serde(default)]
    pub version: u64,
    /// Attributes by name.
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Schema {
    /// Empty schema at `version`.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            ..Default::default()
        }
    }

    /// Empty schema at version 0.
    pub fn v0() -> Self {
        Self::new(0)
    }

    /// Add or replace the attribute `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }
}

/// Everything the provider exposes to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Provider configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Resource schemas by resource type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Schema with no resources and an empty configuration block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration block.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register the resource type `name`.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Look up a resource schema.
    pub fn resource(&self, name: &str) -> Option<&Schema> {
        self.resources.get(name)
    }
}

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Blocks the operation.
    Error,
    /// Reported but not blocking.
    Warning,
}

/// A validation finding reported back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity.
    pub severity: DiagnosticSeverity,
    /// One-line summary.
    pub summary: String,
    /// Longer explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, e.g. `contact_methods.0.type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn with_severity(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Blocking diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Error, summary)
    }

    /// Non-blocking diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::with_severity(DiagnosticSeverity::Warning, summary)
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Attach the offending attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic blocks the operation.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_helpers() {
        assert!(Attribute::required_string().is_required());
        assert!(Attribute::computed_string().is_computed_only());
        let last_updated = Attribute::new(AttributeType::String, Presence::OptionalComputed);
        assert!(!last_updated.is_computed_only());
        assert!(Attribute::optional_string().sensitive().sensitive);
    }

    #[test]
    fn test_object_fields_are_ordered() {
        let shape = AttributeType::object([
            ("type", AttributeType::String),
            ("summary", AttributeType::String),
        ]);
        match shape {
            AttributeType::Object(fields) => {
                assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["summary", "type"]);
            },
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn test_schema_serialization() {
        let schema = Schema::v0()
            .with_attribute("token", Attribute::required_string().sensitive())
            .with_attribute("from", Attribute::optional_string().with_description("Sender"));
        let json = serde_json::to_value(&schema).unwrap();

        assert_eq!(json["attributes"]["token"]["type"], "string");
        assert_eq!(json["attributes"]["token"]["presence"], "required");
        assert_eq!(json["attributes"]["token"]["sensitive"], true);
        assert!(json["attributes"]["from"].get("sensitive").is_none());
        assert_eq!(json["attributes"]["from"]["description"], "Sender");
    }

    #[test]
    fn test_lookups() {
        let schema = ProviderSchema::new().with_resource(
            "pagerduty_user",
            Schema::v0().with_attribute("name", Attribute::required_string()),
        );
        let user = schema.resource("pagerduty_user").unwrap();
        assert!(user.attribute("name").is_some());
        assert!(user.attribute("nickname").is_none());
        assert!(schema.resource("pagerduty_team").is_none());
    }

    #[test]
    fn test_diagnostic_builders() {
        let diag = Diagnostic::error("Missing")
            .with_detail("name is required")
            .with_attribute("name");
        assert!(diag.is_error());
        assert_eq!(diag.detail.as_deref(), Some("name is required"));
        assert_eq!(diag.attribute.as_deref(), Some("name"));

        assert!(!Diagnostic::warning("heads up").is_error());
    }
}
