//! Plan and import results exchanged with the host.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One attribute difference in a plan. `before` is `None` for additions and
/// `after` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Top-level attribute name, e.g. `parameter_values`.
    pub path: String,
    /// Prior value.
    pub before: Option<Value>,
    /// Planned value.
    pub after: Option<Value>,
}

impl AttributeChange {
    fn between(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        let path = path.into();
        Self { path, before, after }
    }

    /// An attribute that becomes set.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::between(path, None, Some(value))
    }

    /// An attribute that goes away.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::between(path, Some(value), None)
    }

    /// An attribute whose value changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::between(path, Some(before), Some(after))
    }
}

/// Outcome of planning one resource instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// State the host should expect after apply; `Null` for a destroy.
    pub planned_state: Value,
    /// Attribute differences against the prior state.
    pub changes: Vec<AttributeChange>,
    /// Set when a force-new attribute changed.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Nothing to apply.
    pub fn no_change(planned_state: Value) -> Self {
        Self::with_changes(planned_state, vec![], false)
    }

    /// A plan carrying `changes`.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// State produced by an import, tagged with its resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// e.g. `teamcity_project`.
    pub resource_type: String,
    /// Full resource state as `read` would report it.
    pub state: Value,
}

impl ImportedResource {
    /// Tag `state` with `resource_type`.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        let resource_type = resource_type.into();
        Self { resource_type, state }
    }
}

/// What the provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Registered resource type names, sorted.
    pub resources: Vec<String>,
}

/// Deserialize `null` as the type's default. Hosts send unset optional
/// attributes as explicit nulls.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("test"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("test")));

        let removed = AttributeChange::removed("name", json!("old"));
        assert_eq!(removed.before, Some(json!("old")));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("description", json!("a"), json!("b"));
        assert_eq!(modified.before, Some(json!("a")));
        assert_eq!(modified.after, Some(json!("b")));
    }

    #[test]
    fn test_plan_result() {
        let no_change = PlanResult::no_change(json!({"id": "Foo"}));
        assert!(no_change.changes.is_empty());
        assert!(!no_change.requires_replace);

        let replace = PlanResult::with_changes(
            json!({"id": null, "parent": "Other"}),
            vec![AttributeChange::modified("parent", json!("_Root"), json!("Other"))],
            true,
        );
        assert_eq!(replace.changes.len(), 1);
        assert!(replace.requires_replace);
    }

    #[test]
    fn test_null_as_default() {
        #[derive(Deserialize)]
        struct Tagged {
            #[serde(default, deserialize_with = "null_as_default")]
            name: String,
            #[serde(default, deserialize_with = "null_as_default")]
            tags: Vec<String>,
        }

        let tagged: Tagged = serde_json::from_value(json!({"name": null})).unwrap();
        assert_eq!(tagged.name, "");
        assert!(tagged.tags.is_empty());

        let tagged: Tagged = serde_json::from_value(json!({"name": "x", "tags": ["a"]})).unwrap();
        assert_eq!(tagged.name, "x");
        assert_eq!(tagged.tags, vec!["a".to_string()]);
    }
}
