//! Project parameter model.
//!
//! TeamCity stores parameters per project and reports them as a single merged
//! view (own definitions layered over everything inherited from ancestors).
//! A [`Parameter`] carrying a [`ParameterSpec`] is *owned* by the project that
//! declares it; one without a spec is a plain value override of an inherited
//! or ad-hoc parameter.

pub mod codec;
pub mod reconcile;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A mapping from parameter name to parameter. Ordered so that remote calls
/// and serialized state are deterministic.
pub type Parameters = BTreeMap<String, Parameter>;

/// The control type TeamCity renders for a typed parameter.
///
/// Keywords other than the four built-in ones (from plugins or newer servers)
/// are kept verbatim as [`ParameterType::Other`] so they survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ParameterType {
    /// Free-form text.
    #[default]
    Text,
    /// A secret. The server never returns its value.
    Password,
    /// A boolean checkbox.
    Checkbox,
    /// A drop-down selection.
    Select,
    /// Any other keyword.
    Other(String),
}

impl ParameterType {
    /// The keyword used for this type in TeamCity raw specs and in configuration.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "text",
            Self::Password => "password",
            Self::Checkbox => "checkbox",
            Self::Select => "select",
            Self::Other(keyword) => keyword,
        }
    }

    /// Parse one of the built-in keywords. Anything else yields `None`.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "text" => Some(Self::Text),
            "password" => Some(Self::Password),
            "checkbox" => Some(Self::Checkbox),
            "select" => Some(Self::Select),
            _ => None,
        }
    }

    /// Like [`ParameterType::parse`], keeping unknown keywords as `Other`.
    pub fn from_keyword(keyword: &str) -> Self {
        Self::parse(keyword).unwrap_or_else(|| Self::Other(keyword.to_string()))
    }
}

impl From<String> for ParameterType {
    fn from(keyword: String) -> Self {
        Self::from_keyword(&keyword)
    }
}

impl From<ParameterType> for String {
    fn from(kind: ParameterType) -> Self {
        kind.as_str().to_string()
    }
}

/// When a typed parameter is shown in the run-custom-build dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDisplay {
    /// Shown, with a value pre-filled.
    #[default]
    Normal,
    /// Always prompts for a value.
    Prompt,
    /// Never shown.
    Hidden,
}

impl ParameterDisplay {
    /// The keyword used for this display mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Prompt => "prompt",
            Self::Hidden => "hidden",
        }
    }

    /// Parse a display keyword.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "normal" => Some(Self::Normal),
            "prompt" => Some(Self::Prompt),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }
}

/// The type specification of an owned parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ParameterSpec {
    /// The control type.
    pub kind: ParameterType,
    /// Label shown in the UI.
    pub label: Option<String>,
    /// Help text shown in the UI.
    pub description: Option<String>,
    /// Display mode.
    pub display: ParameterDisplay,
    /// Whether the value can be changed when triggering a build.
    pub read_only: bool,
    /// Raw-spec keys with no dedicated field, such as select items
    /// (`data_1`) or `validationMode`. Written back unchanged.
    pub options: BTreeMap<String, String>,
}

impl ParameterSpec {
    /// A spec of the given kind with every other field at its default.
    pub fn new(kind: ParameterType) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// A plain text spec.
    pub fn text() -> Self {
        Self::new(ParameterType::Text)
    }

    /// A password spec.
    pub fn password() -> Self {
        Self::new(ParameterType::Password)
    }

    /// Whether values of this parameter are redacted by the server.
    pub fn is_secret(&self) -> bool {
        self.kind == ParameterType::Password
    }
}

/// A single project parameter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameter {
    /// The current value, possibly empty.
    pub value: String,
    /// Present when the parameter is defined (owned) at this level.
    pub spec: Option<ParameterSpec>,
}

impl Parameter {
    /// A value override without a spec.
    pub fn value_only(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            spec: None,
        }
    }

    /// An owned parameter with the given spec.
    pub fn owned(value: impl Into<String>, spec: ParameterSpec) -> Self {
        Self {
            value: value.into(),
            spec: Some(spec),
        }
    }

    /// Whether this parameter carries its own spec.
    pub fn is_owned(&self) -> bool {
        self.spec.is_some()
    }

    /// Whether this parameter is a password.
    pub fn is_secret(&self) -> bool {
        self.spec.as_ref().is_some_and(ParameterSpec::is_secret)
    }

    /// The same value with the spec stripped.
    pub fn as_override(&self) -> Self {
        Self::value_only(self.value.clone())
    }

    /// Replace the value, keeping the spec.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ownership() {
        assert!(!Parameter::value_only("1").is_owned());
        assert!(Parameter::owned("1", ParameterSpec::text()).is_owned());
    }

    #[test]
    fn test_secret_detection() {
        assert!(Parameter::owned("", ParameterSpec::password()).is_secret());
        assert!(!Parameter::owned("", ParameterSpec::text()).is_secret());
        assert!(!Parameter::value_only("x").is_secret());
    }

    #[test]
    fn test_as_override_drops_spec() {
        let inherited = Parameter::owned("1", ParameterSpec::password());
        assert_eq!(inherited.as_override(), Parameter::value_only("1"));
    }

    #[test]
    fn test_keywords() {
        for kind in [
            ParameterType::Text,
            ParameterType::Password,
            ParameterType::Checkbox,
            ParameterType::Select,
        ] {
            assert_eq!(ParameterType::parse(kind.as_str()), Some(kind.clone()));
        }
        assert_eq!(ParameterType::parse("multiline"), None);
        assert_eq!(
            ParameterType::from_keyword("multiline"),
            ParameterType::Other("multiline".to_string())
        );
        assert_eq!(ParameterType::from_keyword("select"), ParameterType::Select);
        assert_eq!(
            serde_json::to_value(ParameterType::Other("multiline".to_string())).unwrap(),
            serde_json::json!("multiline")
        );
        let kind: ParameterType = serde_json::from_value(serde_json::json!("checkbox")).unwrap();
        assert_eq!(kind, ParameterType::Checkbox);
        assert_eq!(ParameterDisplay::parse("hidden"), Some(ParameterDisplay::Hidden));
        assert_eq!(ParameterDisplay::parse("loud"), None);
    }
}
