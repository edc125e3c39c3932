//! Resource adapters and the registry the provider dispatches into.
//!
//! Each adapter implements [`Resource`]: a schema plus Create/Read/Update/
//! Delete/Import callbacks that take loosely-typed state from the host,
//! deserialize it once into a typed struct, and drive [`TeamcityApi`].

pub mod agent_pool_project_attachment;
pub mod project;

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::client::TeamcityApi;
use crate::error::ProviderError;
use crate::schema::{Diagnostic, Schema};
use crate::types::{AttributeChange, PlanResult};
use crate::validation;

pub use agent_pool_project_attachment::AgentPoolProjectAttachmentResource;
pub use project::ProjectResource;

/// A resource type managed by the provider.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name used in configuration, e.g. `teamcity_project`.
    fn type_name(&self) -> &'static str;

    /// Schema of the resource configuration.
    fn schema(&self) -> Schema;

    /// Validate a configuration. The default checks it against [`Resource::schema`].
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validation::validate(&self.schema(), config)
    }

    /// Bring a state value into canonical form so that equal states compare
    /// equal as JSON.
    fn normalize(&self, state: Value) -> Result<Value, ProviderError>;

    /// Create the remote object and return the resulting state.
    async fn create(&self, api: &dyn TeamcityApi, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state from the server. `None` means the object is gone.
    async fn read(
        &self,
        api: &dyn TeamcityApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update the remote object in place.
    async fn update(
        &self,
        api: &dyn TeamcityApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (api, prior, planned);
        Err(ProviderError::InvalidRequest(format!(
            "{} cannot be updated in place",
            self.type_name()
        )))
    }

    /// Delete the remote object.
    async fn delete(&self, api: &dyn TeamcityApi, current: Value) -> Result<(), ProviderError>;

    /// Build state for an existing remote object.
    async fn import(&self, api: &dyn TeamcityApi, id: &str) -> Result<Value, ProviderError> {
        let _ = (api, id);
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            self.type_name()
        )))
    }
}

/// Resource adapters keyed by type name.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<&'static str, Box<dyn Resource>>,
}

impl ResourceRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry with every TeamCity resource type.
    pub fn teamcity() -> Self {
        Self::new()
            .with(ProjectResource)
            .with(AgentPoolProjectAttachmentResource)
    }

    /// Register an adapter, replacing any previous one of the same type.
    pub fn with(mut self, resource: impl Resource + 'static) -> Self {
        self.resources.insert(resource.type_name(), Box::new(resource));
        self
    }

    /// Look up an adapter.
    pub fn get(&self, type_name: &str) -> Result<&dyn Resource, ProviderError> {
        self.resources
            .get(type_name)
            .map(|r| r.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Registered type names in order.
    pub fn names(&self) -> Vec<String> {
        self.resources.keys().map(|n| n.to_string()).collect()
    }

    /// Schemas of every registered type.
    pub fn schemas(&self) -> BTreeMap<String, Schema> {
        self.resources
            .iter()
            .map(|(name, r)| (name.to_string(), r.schema()))
            .collect()
    }
}

/// Compute the plan for one resource instance.
///
/// A `Null` proposal plans a delete. Otherwise schema defaults are filled in,
/// computed attributes are carried over from the prior state, and both sides
/// are normalized before being compared attribute by attribute.
pub fn plan_resource(
    resource: &dyn Resource,
    prior: Option<Value>,
    proposed: Value,
) -> Result<PlanResult, ProviderError> {
    let schema = resource.schema();

    if proposed.is_null() {
        let Some(prior) = prior else {
            return Ok(PlanResult::no_change(Value::Null));
        };
        let changes = attributes(&prior)
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::removed(k, v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(Value::Null, changes, false));
    }

    let mut planned = with_defaults(&schema, proposed);
    let Some(prior) = prior.filter(|p| !p.is_null()) else {
        let planned = resource.normalize(planned)?;
        let changes = attributes(&planned)
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::added(k, v.clone()))
            .collect();
        return Ok(PlanResult::with_changes(planned, changes, false));
    };

    let prior = resource.normalize(prior)?;
    carry_computed(&schema, &prior, &mut planned);
    let planned = resource.normalize(planned)?;

    let keys: BTreeSet<&String> = attributes(&prior)
        .chain(attributes(&planned))
        .map(|(k, _)| k)
        .collect();

    let mut changes = Vec::new();
    for key in keys {
        let before = prior.get(key).filter(|v| !v.is_null());
        let after = planned.get(key).filter(|v| !v.is_null());
        match (before, after) {
            (Some(b), Some(a)) if b != a => {
                changes.push(AttributeChange::modified(key.clone(), b.clone(), a.clone()))
            }
            (Some(b), None) => changes.push(AttributeChange::removed(key.clone(), b.clone())),
            (None, Some(a)) => changes.push(AttributeChange::added(key.clone(), a.clone())),
            _ => {}
        }
    }

    let force_new: BTreeSet<&str> = schema.force_new_attributes().collect();
    let requires_replace = changes.iter().any(|c| force_new.contains(c.path.as_str()));

    if changes.is_empty() {
        Ok(PlanResult::no_change(planned))
    } else {
        Ok(PlanResult::with_changes(planned, changes, requires_replace))
    }
}

fn attributes(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value.as_object().into_iter().flat_map(Map::iter)
}

fn with_defaults(schema: &Schema, mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        for (name, attr) in &schema.block.attributes {
            let Some(default) = &attr.default else {
                continue;
            };
            if obj.get(name).map_or(true, Value::is_null) {
                obj.insert(name.clone(), default.clone());
            }
        }
    }
    value
}

fn carry_computed(schema: &Schema, prior: &Value, planned: &mut Value) {
    let Some(obj) = planned.as_object_mut() else {
        return;
    };
    for (name, attr) in &schema.block.attributes {
        if !attr.flags.computed || obj.get(name).is_some_and(|v| !v.is_null()) {
            continue;
        }
        if let Some(value) = prior.get(name).filter(|v| !v.is_null()) {
            obj.insert(name.clone(), value.clone());
        }
    }
}

/// Deserialize host state into a typed struct.
pub(crate) fn from_state<T: DeserializeOwned>(state: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(state)?)
}

/// Serialize a typed struct back into host state.
pub(crate) fn to_state<T: Serialize>(state: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        assert_plan_changes_attribute, assert_plan_creates, assert_plan_does_not_change_attribute,
        assert_plan_no_changes, assert_plan_replaces, assert_plan_updates_in_place,
    };
    use serde_json::json;

    #[test]
    fn test_registry() {
        let registry = ResourceRegistry::teamcity();
        assert_eq!(
            registry.names(),
            vec![
                "teamcity_agent_pool_project_attachment".to_string(),
                "teamcity_project".to_string()
            ]
        );
        assert!(registry.get("teamcity_project").is_ok());
        assert!(matches!(
            registry.get("teamcity_vcs_root"),
            Err(ProviderError::UnknownResource(_))
        ));
        assert_eq!(registry.schemas().len(), 2);
    }

    #[test]
    fn test_plan_create_applies_defaults() {
        let plan = plan_resource(&ProjectResource, None, json!({"name": "Backend"})).unwrap();
        assert_plan_creates(&plan);
        assert_eq!(plan.planned_state["parent"], "_Root");
        assert_eq!(plan.planned_state["description"], "");
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_does_not_change_attribute(&plan, "id");
    }

    #[test]
    fn test_plan_no_changes_ignores_parameter_order() {
        let prior = json!({
            "id": "Backend",
            "name": "Backend",
            "parameter": [{"name": "b", "value": "2"}, {"name": "a", "value": "1"}]
        });
        let proposed = json!({
            "name": "Backend",
            "parameter": [{"name": "a", "value": "1"}, {"name": "b", "value": "2"}]
        });
        let plan = plan_resource(&ProjectResource, Some(prior), proposed).unwrap();
        assert_plan_no_changes(&plan);
        assert_eq!(plan.planned_state["id"], "Backend");
    }

    #[test]
    fn test_plan_update_in_place() {
        let prior = json!({"id": "Backend", "name": "Backend"});
        let proposed = json!({"name": "Backend services", "parameter_values": {"env.A": "1"}});
        let plan = plan_resource(&ProjectResource, Some(prior), proposed).unwrap();
        assert_plan_updates_in_place(&plan);
        assert_plan_changes_attribute(&plan, "name");
        assert_plan_changes_attribute(&plan, "parameter_values");
    }

    #[test]
    fn test_plan_parent_change_replaces() {
        let prior = json!({"id": "Backend", "name": "Backend", "parent": "_Root"});
        let proposed = json!({"name": "Backend", "parent": "Platform"});
        let plan = plan_resource(&ProjectResource, Some(prior), proposed).unwrap();
        assert_plan_replaces(&plan);
    }

    #[test]
    fn test_plan_attachment_replaces() {
        let prior = json!({"id": "1_Backend", "pool": 1, "project": "Backend"});
        let proposed = json!({"pool": 2, "project": "Backend"});
        let plan =
            plan_resource(&AgentPoolProjectAttachmentResource, Some(prior), proposed).unwrap();
        assert_plan_replaces(&plan);
        assert_plan_changes_attribute(&plan, "pool");
    }

    #[test]
    fn test_plan_delete() {
        let prior = json!({"id": "Backend", "name": "Backend"});
        let plan = plan_resource(&ProjectResource, Some(prior), Value::Null).unwrap();
        assert!(plan.planned_state.is_null());
        assert_plan_changes_attribute(&plan, "name");

        let plan = plan_resource(&ProjectResource, None, Value::Null).unwrap();
        assert_plan_no_changes(&plan);
    }
}
