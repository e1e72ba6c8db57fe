//! Schema validation helpers.
//!
//! Validates a `serde_json::Value` against a [`Schema`] and reports every
//! problem as a [`Diagnostic`] carrying the offending attribute path.
//!
//! # Example
//!
//! ```
//! use pagerduty_provider::schema::{Attribute, Schema};
//! use pagerduty_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("role", Attribute::optional_string());
//!
//! assert!(validate(&schema, &json!({"name": "Alice"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Alice", "role": 7}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("role".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Validate a JSON value against a schema.
///
/// An empty list means the value is valid.
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - Attributes not declared in the schema are rejected
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for name in obj.keys() {
        if !schema.attributes.contains_key(name) {
            diagnostics.push(
                Diagnostic::error(format!("Unsupported attribute '{}'", name))
                    .with_detail("This attribute is not declared in the schema")
                    .with_attribute(name.as_str()),
            );
        }
    }

    diagnostics
}

/// Validate a JSON value, returning `Err` with the diagnostics if invalid.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON value is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.is_required() {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_type(&attr.kind, v, path, diagnostics),
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::List(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_type(element_type, item, &format!("{}.{}", path, i), diagnostics);
                }
            },
            None => diagnostics.push(type_error(path, "list", value)),
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(obj) => validate_object(fields, obj, path, diagnostics),
            None => diagnostics.push(type_error(path, "object", value)),
        },
    }
}

// Object fields carry no required/optional flags, so presence is not enforced.
fn validate_object(
    fields: &BTreeMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, field_type) in fields {
        if let Some(value) = obj.get(name).filter(|v| !v.is_null()) {
            validate_type(field_type, value, &format!("{}.{}", path, name), diagnostics);
        }
    }
}

fn type_error(path: &str, expected: &str, value: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(value)
        ))
        .with_attribute(path)
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Presence;
    use serde_json::json;

    fn user_like_schema() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("nickname", Attribute::optional_string())
            .with_attribute(
                "contact_methods",
                Attribute::new(
                    AttributeType::list(AttributeType::object([
                        ("type", AttributeType::String),
                        ("summary", AttributeType::String),
                    ])),
                    Presence::OptionalComputed,
                ),
            )
    }

    #[test]
    fn test_valid_value() {
        let value = json!({
            "name": "Alice",
            "contact_methods": [{"type": "email_contact_method_reference", "summary": "Default"}]
        });
        assert!(is_valid(&user_like_schema(), &value));
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&user_like_schema(), &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
        assert!(diagnostics[0].summary.contains("Missing required attribute"));
    }

    #[test]
    fn test_null_required_is_missing() {
        let diagnostics = validate(&user_like_schema(), &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_optional_may_be_absent_or_null() {
        assert!(is_valid(
            &user_like_schema(),
            &json!({"name": "Alice", "nickname": null})
        ));
    }

    #[test]
    fn test_computed_only_is_skipped() {
        assert!(is_valid(
            &user_like_schema(),
            &json!({"name": "Alice", "id": 42})
        ));
    }

    #[test]
    fn test_wrong_type() {
        let diagnostics = validate(&user_like_schema(), &json!({"name": 1}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Expected string, got number")
        );
    }

    #[test]
    fn test_nested_list_object_paths() {
        let value = json!({
            "name": "Alice",
            "contact_methods": [
                {"type": "sms_contact_method_reference", "summary": "Mobile"},
                {"type": true, "summary": "Default"}
            ]
        });
        let diagnostics = validate(&user_like_schema(), &value);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("contact_methods.1.type")
        );
    }

    #[test]
    fn test_list_expected() {
        let value = json!({"name": "Alice", "contact_methods": "none"});
        let diagnostics = validate(&user_like_schema(), &value);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected list, got string"));
    }

    #[test]
    fn test_unsupported_attribute() {
        let diagnostics = validate(&user_like_schema(), &json!({"name": "Alice", "nmae": "x"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("nmae"));
    }

    #[test]
    fn test_non_object_root() {
        let diagnostics = validate(&user_like_schema(), &json!(["Alice"]));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Expected object");
    }

    #[test]
    fn test_validate_result() {
        assert!(validate_result(&user_like_schema(), &json!({"name": "Alice"})).is_ok());
        let errs = validate_result(&user_like_schema(), &json!({})).unwrap_err();
        assert_eq!(errs.len(), 1);
    }
}
