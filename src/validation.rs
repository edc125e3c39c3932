//! Boundary validation of configuration values.
//!
//! Configuration arrives from the host as loosely-typed JSON. It is checked
//! once against the resource [`Schema`] here, then deserialized into a typed
//! struct by the resource.
//!
//! ```
//! use hemmer_provider_teamcity::schema::{Attribute, Schema};
//! use hemmer_provider_teamcity::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute("pool", Attribute::required_int64());
//!
//! assert!(validate(&schema, &json!({"name": "Build", "pool": 3})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "Build", "pool": "three"}));
//! assert_eq!(diagnostics[0].attribute, Some("pool".to_string()));
//! ```

use serde_json::Value;

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};

/// Id of the implicit top-level project.
pub const ROOT_PROJECT_ID: &str = "_Root";

const MAX_ID_LENGTH: usize = 225;

/// Validate a JSON value against a schema. An empty list means valid.
///
/// Required attributes must be present and non-null, computed-only
/// attributes are skipped, and nested blocks are checked item by item.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], but as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check a TeamCity external id.
///
/// Valid ids are `_Root`, or start with an ASCII letter and contain only
/// ASCII letters, digits and underscores, up to 225 characters.
pub fn validate_project_id(id: &str) -> Result<(), String> {
    if id == ROOT_PROJECT_ID {
        return Ok(());
    }
    let Some(first) = id.chars().next() else {
        return Err("id must not be empty".to_string());
    };
    if !first.is_ascii_alphabetic() {
        return Err(format!("id '{}' must start with a latin letter", id));
    }
    if let Some(bad) = id.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
        return Err(format!(
            "id '{}' contains unsupported character '{}'; \
             use latin letters, digits and underscores",
            id, bad
        ));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(format!(
            "id '{}' is longer than {} characters",
            id, MAX_ID_LENGTH
        ));
    }
    Ok(())
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        other => {
            let mut diagnostic = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", type_name(other)));
            if !path.is_empty() {
                diagnostic = diagnostic.with_attribute(path);
            }
            diagnostics.push(diagnostic);
            return;
        }
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_attribute(path),
                );
            }
        }
        Some(v) => validate_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => value.as_i64().is_some(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Map(element_type) => match value.as_object() {
            Some(obj) => {
                for (key, element) in obj {
                    validate_type(element_type, element, &join_path(path, key), diagnostics);
                }
                true
            }
            None => false,
        },
    };

    if !ok {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!(
                    "Expected {}, got {}",
                    expected_name(attr_type),
                    type_name(value)
                ))
                .with_attribute(path),
        );
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items = match value {
        None | Some(Value::Null) => return,
        Some(Value::Array(items)) => items,
        Some(other) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(other)))
                    .with_attribute(path),
            );
            return;
        }
    };

    if nested.max_items > 0 && items.len() > nested.max_items as usize {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path,
                nested.max_items,
                items.len()
            ))
            .with_attribute(path),
        );
    }

    for (i, item) in items.iter().enumerate() {
        validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn expected_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::Map(_) => "map",
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock, Schema};
    use serde_json::json;

    fn project_like() -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("parameter_values", Attribute::optional_string_map())
            .with_block(
                "parameter",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("name", Attribute::required_string())
                        .with_attribute("read_only", Attribute::optional_bool()),
                ),
            )
    }

    #[test]
    fn test_valid_config() {
        let diagnostics = validate(
            &project_like(),
            &json!({
                "name": "Build",
                "parameter_values": {"env.A": "1"},
                "parameter": [{"name": "env.B", "read_only": true}]
            }),
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_missing_required() {
        let diagnostics = validate(&project_like(), &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let diagnostics = validate(&project_like(), &json!({"name": "x", "id": 12}));
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_map_element_type() {
        let diagnostics = validate(
            &project_like(),
            &json!({"name": "x", "parameter_values": {"env.A": 1}}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute,
            Some("parameter_values.env.A".to_string())
        );
    }

    #[test]
    fn test_nested_block_items() {
        let diagnostics = validate(
            &project_like(),
            &json!({"name": "x", "parameter": [{"name": "ok"}, {"read_only": "yes"}]}),
        );
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute, Some("parameter.1.name".to_string()));
        assert_eq!(
            diagnostics[1].attribute,
            Some("parameter.1.read_only".to_string())
        );

        let diagnostics = validate(&project_like(), &json!({"name": "x", "parameter": {}}));
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_max_items() {
        let schema = Schema::v0().with_block(
            "rule",
            NestedBlock::list(Block::new().with_attribute("port", Attribute::required_int64()))
                .with_max_items(1),
        );
        let diagnostics = validate(&schema, &json!({"rule": [{"port": 1}, {"port": 2}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));
    }

    #[test]
    fn test_int64() {
        let schema = Schema::v0().with_attribute("pool", Attribute::required_int64());
        assert!(validate(&schema, &json!({"pool": 42})).is_empty());
        assert_eq!(validate(&schema, &json!({"pool": 4.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"pool": "42"})).len(), 1);
    }

    #[test]
    fn test_root_not_object() {
        let diagnostics = validate(&project_like(), &json!("Build"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, None);
        assert!(validate_result(&project_like(), &json!([])).is_err());
    }

    #[test]
    fn test_project_ids() {
        assert!(validate_project_id("_Root").is_ok());
        assert!(validate_project_id("Backend_Services2").is_ok());
        assert!(validate_project_id("").is_err());
        assert!(validate_project_id("_Other").is_err());
        assert!(validate_project_id("9Lives").is_err());
        assert!(validate_project_id("has-dash").is_err());
        assert!(validate_project_id(&"a".repeat(226)).is_err());
        assert!(validate_project_id(&"a".repeat(225)).is_ok());
    }
}
