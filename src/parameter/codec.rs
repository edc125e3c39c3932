//! Conversion between the `parameter` configuration block and [`Parameters`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{Parameter, ParameterDisplay, ParameterSpec, ParameterType, Parameters};
use crate::types::null_as_default;

/// One entry of a project's `parameter` block: an explicitly owned parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterDefinition {
    /// Parameter name, e.g. `env.JAVA_HOME`.
    pub name: String,
    /// Declared value.
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
    /// Control type.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: ParameterType,
    /// UI label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// UI help text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display mode.
    #[serde(default, deserialize_with = "null_as_default")]
    pub display: ParameterDisplay,
    /// Read-only flag.
    #[serde(default, deserialize_with = "null_as_default")]
    pub read_only: bool,
    /// Extra raw-spec keys, e.g. `data_1` for select items.
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub options: BTreeMap<String, String>,
}

impl ParameterDefinition {
    /// A text definition with the given name and value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ParameterType::Text,
            label: None,
            description: None,
            display: ParameterDisplay::Normal,
            read_only: false,
            options: BTreeMap::new(),
        }
    }

    /// Set the control type.
    pub fn with_kind(mut self, kind: ParameterType) -> Self {
        self.kind = kind;
        self
    }

    /// Add an extra raw-spec key.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set the UI label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Convert into an owned parameter.
    pub fn to_parameter(&self) -> Parameter {
        Parameter::owned(
            self.value.clone(),
            ParameterSpec {
                kind: self.kind.clone(),
                label: non_empty(self.label.as_deref()),
                description: non_empty(self.description.as_deref()),
                display: self.display,
                read_only: self.read_only,
                options: self.options.clone(),
            },
        )
    }

    /// Build a definition from an owned parameter; `None` for value overrides.
    pub fn from_parameter(name: &str, parameter: &Parameter) -> Option<Self> {
        let spec = parameter.spec.as_ref()?;
        Some(Self {
            name: name.to_string(),
            value: parameter.value.clone(),
            kind: spec.kind.clone(),
            label: spec.label.clone(),
            description: spec.description.clone(),
            display: spec.display,
            read_only: spec.read_only,
            options: spec.options.clone(),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Decode a `parameter` block into a parameter mapping.
///
/// Later entries win when a name repeats. Resource validation rejects
/// repeated names before a block gets here.
pub fn decode(definitions: &[ParameterDefinition]) -> Parameters {
    definitions
        .iter()
        .map(|d| (d.name.clone(), d.to_parameter()))
        .collect()
}

/// Encode the owned parameters of a mapping into a `parameter` block, ordered by name.
/// Value overrides are skipped.
pub fn encode(parameters: &Parameters) -> Vec<ParameterDefinition> {
    parameters
        .iter()
        .filter_map(|(name, p)| ParameterDefinition::from_parameter(name, p))
        .collect()
}

/// Stable identity of a definition over all of its semantic fields.
///
/// Two definitions hash equal exactly when they describe the same parameter,
/// independent of their position in the block.
pub fn identity_hash(definition: &ParameterDefinition) -> u64 {
    let read_only = if definition.read_only { "true" } else { "false" };
    let fields = [
        definition.name.as_str(),
        definition.value.as_str(),
        definition.kind.as_str(),
        definition.label.as_deref().unwrap_or_default(),
        definition.description.as_deref().unwrap_or_default(),
        definition.display.as_str(),
        read_only,
    ];

    let mut hasher = Sha256::new();
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0u8]);
    }
    for (key, value) in &definition.options {
        hasher.update(key.as_bytes());
        hasher.update([b'=']);
        hasher.update(value.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix)
}

/// Sort a block into canonical order so that two blocks with the same members compare equal.
pub fn canonicalize(definitions: &mut [ParameterDefinition]) {
    definitions.sort_by_cached_key(|d| (d.name.clone(), identity_hash(d)));
}
