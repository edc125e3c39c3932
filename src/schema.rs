//! Schema types describing the provider configuration and each resource.
//!
//! Schemas drive boundary validation ([`crate::validation`]) and planning
//! (defaults and force-new attributes), and are handed to the host as-is.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Value type of an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// Plain text.
    String,
    /// Whole number; pool ids use this.
    Int64,
    /// `true` or `false`.
    Bool,
    /// String-keyed map with homogeneous values.
    Map(Box<AttributeType>),
}

impl AttributeType {
    /// `Map` of `element_type`.
    pub fn map(element_type: AttributeType) -> Self {
        Self::Map(Box::new(element_type))
    }
}

/// Whether configuration must, may, or cannot set an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttributeFlags {
    /// Must be set.
    pub required: bool,
    /// May be set.
    pub optional: bool,
    /// Filled in by the provider.
    pub computed: bool,
    /// Hidden from plan output.
    pub sensitive: bool,
}

impl AttributeFlags {
    /// Must be set.
    pub fn required() -> Self {
        Self {
            required: true,
            ..Default::default()
        }
    }

    /// May be set.
    pub fn optional() -> Self {
        Self {
            optional: true,
            ..Default::default()
        }
    }

    /// Provider-filled.
    pub fn computed() -> Self {
        Self {
            computed: true,
            ..Default::default()
        }
    }
}

/// One attribute of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Value type.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Required/optional/computed/sensitive.
    #[serde(flatten)]
    pub flags: AttributeFlags,
    /// Shown in generated docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A change to this attribute plans a replacement.
    #[serde(default)]
    pub force_new: bool,
    /// Filled in at plan time when the attribute is unset or null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

impl Attribute {
    /// An attribute with no description, default, or force-new.
    pub fn new(attr_type: AttributeType, flags: AttributeFlags) -> Self {
        Self {
            attr_type,
            flags,
            description: None,
            force_new: false,
            default: None,
        }
    }

    /// A required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::required())
    }

    /// An optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::optional())
    }

    /// A computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, AttributeFlags::computed())
    }

    /// A required int64 attribute.
    pub fn required_int64() -> Self {
        Self::new(AttributeType::Int64, AttributeFlags::required())
    }

    /// An optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, AttributeFlags::optional())
    }

    /// An optional map of strings.
    pub fn optional_string_map() -> Self {
        Self::new(
            AttributeType::map(AttributeType::String),
            AttributeFlags::optional(),
        )
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the resource when this attribute changes.
    pub fn with_force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Default used when the attribute is unset.
    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Hide the value from plan output.
    pub fn sensitive(mut self) -> Self {
        self.flags.sensitive = true;
        self
    }
}

/// How repeated nested blocks are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlockNestingMode {
    /// Ordered; position is significant.
    #[default]
    List,
    /// Unordered; members are compared by identity.
    Set,
}

/// Attributes plus nested blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// Keyed by attribute name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Keyed by block name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, NestedBlock>,
    /// Shown in generated docs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// An empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `attr` under `name`.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A repeated nested block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedBlock {
    /// Shape of each entry.
    #[serde(flatten)]
    pub block: Block,
    /// List or set semantics.
    #[serde(default)]
    pub nesting_mode: BlockNestingMode,
    /// Upper bound on entries; 0 means unbounded.
    #[serde(default)]
    pub max_items: u32,
}

impl NestedBlock {
    /// An ordered list of blocks.
    pub fn list(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::List,
            max_items: 0,
        }
    }

    /// An unordered set of blocks.
    pub fn set(block: Block) -> Self {
        Self {
            block,
            nesting_mode: BlockNestingMode::Set,
            max_items: 0,
        }
    }

    /// Cap the number of entries.
    pub fn with_max_items(mut self, max: u32) -> Self {
        self.max_items = max;
        self
    }
}

/// Schema for a resource or for the provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// Bumped when stored state needs an upgrade.
    #[serde(default)]
    pub version: u64,
    /// Top-level block.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// An empty schema at version 0.
    pub fn v0() -> Self {
        Self::default()
    }

    /// Add a top-level attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a top-level nested block.
    pub fn with_block(mut self, name: impl Into<String>, block: NestedBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Names of the attributes that force replacement when changed.
    pub fn force_new_attributes(&self) -> impl Iterator<Item = &str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.force_new)
            .map(|(name, _)| name.as_str())
    }
}

/// The provider configuration schema plus every resource schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// The `provider` configuration block.
    #[serde(default)]
    pub provider: Schema,
    /// Keyed by resource type name.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// No provider settings and no resources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `schema` for the provider block.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Register the schema of resource type `name`.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }
}

/// How serious a [`Diagnostic`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// The operation cannot proceed.
    Error,
    /// Reported but not fatal.
    Warning,
}

/// A problem reported back to the host, optionally pinned to an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: DiagnosticSeverity,
    /// One-line headline.
    pub summary: String,
    /// Longer explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path such as `parameter.0.type`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// An error with `summary`.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// A warning with `summary`.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            ..Self::error(summary)
        }
    }

    /// Attach a longer explanation.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Pin the diagnostic to an attribute path.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// `true` for [`DiagnosticSeverity::Error`].
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

/// Whether any diagnostic in the list is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_builders() {
        let attr = Attribute::optional_string()
            .with_description("Parent project id")
            .with_default(json!("_Root"))
            .with_force_new();

        assert_eq!(attr.attr_type, AttributeType::String);
        assert!(attr.flags.optional);
        assert!(attr.force_new);
        assert_eq!(attr.default, Some(json!("_Root")));

        let password = Attribute::optional_string().sensitive();
        assert!(password.flags.sensitive);
    }

    #[test]
    fn test_force_new_attributes() {
        let schema = Schema::v0()
            .with_attribute("pool", Attribute::required_int64().with_force_new())
            .with_attribute("project", Attribute::required_string().with_force_new())
            .with_attribute("id", Attribute::computed_string());

        let names: Vec<_> = schema.force_new_attributes().collect();
        assert_eq!(names, vec!["pool", "project"]);
    }

    #[test]
    fn test_schema_serializes_nested_blocks() {
        let schema = Schema::v0().with_block(
            "parameter",
            NestedBlock::set(Block::new().with_attribute("name", Attribute::required_string())),
        );
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["blocks"]["parameter"]["nesting_mode"], "set");
        assert_eq!(
            value["blocks"]["parameter"]["attributes"]["name"]["required"],
            true
        );
    }

    #[test]
    fn test_diagnostic() {
        let err = Diagnostic::error("Invalid project id")
            .with_detail("Ids start with a letter")
            .with_attribute("parent");

        assert!(err.is_error());
        assert_eq!(err.detail, Some("Ids start with a letter".to_string()));
        assert_eq!(err.attribute, Some("parent".to_string()));

        assert!(!Diagnostic::warning("heads up").is_error());
        assert!(has_errors(&[Diagnostic::warning("w"), err]));
        assert!(!has_errors(&[Diagnostic::warning("w")]));
    }
}
