//! `teamcity_project`: a project with its own and overridden parameters.
//!
//! Create and update are multi-step. When a step fails after the project
//! exists, the error carries the state applied so far (see
//! [`ProviderError::PartialApply`]) and reapplying the configuration picks up
//! from there. Nothing is rolled back.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{from_state, to_state, Resource};
use crate::client::{NewProject, Project, TeamcityApi};
use crate::error::ProviderError;
use crate::parameter::codec::{self, ParameterDefinition};
use crate::parameter::reconcile::{self, DesiredParameters, ParameterValues};
use crate::parameter::{ParameterDisplay, ParameterType};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::null_as_default;
use crate::validation::{self, validate_project_id, ROOT_PROJECT_ID};

/// Typed configuration and state of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectState {
    /// Remote id, absent until created.
    #[serde(default)]
    pub id: Option<String>,
    /// Parent project id.
    #[serde(default = "root_project", deserialize_with = "parent_or_root")]
    pub parent: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Parameters owned by this project.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameter: Vec<ParameterDefinition>,
    /// Value overrides by name.
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameter_values: ParameterValues,
}

fn root_project() -> String {
    ROOT_PROJECT_ID.to_string()
}

fn parent_or_root<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|p| !p.is_empty())
        .unwrap_or_else(root_project))
}

impl ProjectState {
    /// Minimal state for an existing project, as used by import.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            parent: root_project(),
            name: String::new(),
            description: String::new(),
            parameter: Vec::new(),
            parameter_values: ParameterValues::new(),
        }
    }

    /// The parameter half of the configuration.
    pub fn desired_parameters(&self) -> DesiredParameters {
        DesiredParameters::new(&self.parameter, &self.parameter_values)
    }

    fn canonicalize(&mut self) {
        codec::canonicalize(&mut self.parameter);
    }

    fn to_value(&self) -> Result<Value, ProviderError> {
        let mut state = self.clone();
        state.canonicalize();
        to_state(&state)
    }

    /// Wrap `err` with this state as the partially applied result.
    fn partial(&self, err: ProviderError) -> ProviderError {
        match self.to_value() {
            Ok(state) => err.with_partial_state(state),
            Err(_) => err,
        }
    }

    fn remote_id(&self) -> Result<&str, ProviderError> {
        self.id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::InvalidRequest("project state has no id".to_string()))
    }
}

/// Adapter for `teamcity_project`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectResource;

impl ProjectResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "teamcity_project";
}

fn parameter_block() -> Block {
    Block::new()
        .with_attribute("name", Attribute::required_string())
        .with_attribute("value", Attribute::optional_string().with_default(json!("")))
        .with_attribute(
            "type",
            Attribute::optional_string()
                .with_default(json!("text"))
                .with_description(
                    "text, password, checkbox or select. Other keywords are passed through.",
                ),
        )
        .with_attribute("label", Attribute::optional_string())
        .with_attribute("description", Attribute::optional_string())
        .with_attribute(
            "display",
            Attribute::optional_string()
                .with_default(json!("normal"))
                .with_description("One of normal, prompt, hidden."),
        )
        .with_attribute("read_only", Attribute::optional_bool())
        .with_attribute(
            "options",
            Attribute::optional_string_map()
                .with_description(
                    "Further spec keys passed through as is, e.g. data_1 for select items.",
                ),
        )
        .with_description("A parameter defined by this project.")
}

/// Checks that need more than the schema: keywords, id format and duplicates.
fn validate_parameters(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if let Some(parent) = config.get("parent").and_then(Value::as_str) {
        if let Err(detail) = validate_project_id(parent) {
            diagnostics.push(
                Diagnostic::error("Invalid parent project id")
                    .with_detail(detail)
                    .with_attribute("parent"),
            );
        }
    }

    let items = config
        .get("parameter")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut seen = BTreeSet::new();
    for (i, item) in items.iter().enumerate() {
        let keyword = |key: &str| item.get(key).and_then(Value::as_str);
        if let Some(kind) = keyword("type").filter(|k| ParameterType::parse(k).is_none()) {
            let diagnostic = if kind.trim().is_empty() {
                Diagnostic::error("Empty parameter type")
            } else {
                Diagnostic::warning(format!("Unrecognized parameter type '{}'", kind)).with_detail(
                    "Sent to TeamCity as is; built-in types are text, password, checkbox, select",
                )
            };
            diagnostics.push(diagnostic.with_attribute(format!("parameter.{}.type", i)));
        }
        if let Some(display) = keyword("display").filter(|d| ParameterDisplay::parse(d).is_none()) {
            diagnostics.push(
                Diagnostic::error(format!("Unknown parameter display '{}'", display))
                    .with_detail("Expected one of normal, prompt, hidden")
                    .with_attribute(format!("parameter.{}.display", i)),
            );
        }
        if let Some(name) = keyword("name") {
            if !seen.insert(name) {
                diagnostics.push(
                    Diagnostic::error(format!("Duplicate parameter '{}'", name))
                        .with_detail("Each parameter name may be declared once per project")
                        .with_attribute(format!("parameter.{}.name", i)),
                );
            }
        }
    }
    diagnostics
}

/// Fetch the parent's merged view. A missing parent is an error.
async fn fetch_parent(api: &dyn TeamcityApi, parent: &str) -> Result<Project, ProviderError> {
    debug!(parent, "Fetching parent project");
    api.get_project(parent)
        .await?
        .ok_or_else(|| ProviderError::NotFound(format!("parent project {}", parent)))
}

/// Rebuild state from the server, or `None` when the project is gone.
async fn read_project(
    api: &dyn TeamcityApi,
    current: &ProjectState,
) -> Result<Option<ProjectState>, ProviderError> {
    let id = current.remote_id()?;
    let Some(project) = api.get_project(id).await? else {
        info!(id, "Project no longer exists");
        return Ok(None);
    };

    let parent = fetch_parent(api, &project.parent_project_id).await?;
    let observed = reconcile::reconstruct(
        &project.parameters,
        &parent.parameters,
        &current.desired_parameters(),
    );

    let mut state = ProjectState {
        id: Some(project.id),
        parent: project.parent_project_id,
        name: project.name,
        description: project.description,
        parameter: codec::encode(&observed.specs),
        parameter_values: observed.values,
    };
    state.canonicalize();
    Ok(Some(state))
}

#[async_trait]
impl Resource for ProjectResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "id",
                Attribute::computed_string().with_description("Project id assigned by TeamCity."),
            )
            .with_attribute(
                "parent",
                Attribute::optional_string()
                    .with_default(json!(ROOT_PROJECT_ID))
                    .with_force_new()
                    .with_description("Id of the parent project."),
            )
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::optional_string().with_default(json!("")))
            .with_attribute(
                "parameter_values",
                Attribute::optional_string_map()
                    .with_description("Values for own, inherited or ad-hoc parameters."),
            )
            .with_block("parameter", NestedBlock::set(parameter_block()))
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = validation::validate(&self.schema(), config);
        if diagnostics.is_empty() {
            diagnostics = validate_parameters(config);
        }
        diagnostics
    }

    fn normalize(&self, state: Value) -> Result<Value, ProviderError> {
        from_state::<ProjectState>(state)?.to_value()
    }

    async fn create(&self, api: &dyn TeamcityApi, planned: Value) -> Result<Value, ProviderError> {
        let planned: ProjectState = from_state(planned)?;

        // everything that can be rejected locally is checked before the first mutation
        let parent = fetch_parent(api, &planned.parent).await?;
        let merged =
            reconcile::merge_for_create(&parent.parameters, &planned.desired_parameters())?;

        let project = api
            .create_project(&NewProject {
                name: planned.name.clone(),
                parent_project_id: planned.parent.clone(),
            })
            .await?;
        info!(id = %project.id, parent = %planned.parent, "Created project");

        let mut applied = ProjectState::with_id(project.id.clone());
        applied.parent = planned.parent.clone();
        applied.name = planned.name.clone();

        if !planned.description.is_empty() {
            api.set_project_description(&project.id, &planned.description)
                .await
                .map_err(|e| applied.partial(e))?;
        }
        applied.description = planned.description.clone();

        api.replace_all_project_parameters(&project.id, &merged)
            .await
            .map_err(|e| applied.partial(e))?;
        info!(id = %project.id, parameters = merged.len(), "Set project parameters");

        let mut state = planned;
        state.id = Some(project.id);
        state.to_value()
    }

    async fn read(
        &self,
        api: &dyn TeamcityApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let current: ProjectState = from_state(current)?;
        read_project(api, &current)
            .await?
            .map(|state| to_state(&state))
            .transpose()
    }

    async fn update(
        &self,
        api: &dyn TeamcityApi,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let prior: ProjectState = from_state(prior)?;
        let mut planned: ProjectState = from_state(planned)?;
        let id = prior.remote_id()?.to_string();
        planned.id = Some(id.clone());

        if planned.parent != prior.parent {
            return Err(ProviderError::InvalidRequest(
                "changing the parent of a project requires replacement".to_string(),
            ));
        }

        let before = prior.desired_parameters();
        let after = planned.desired_parameters();
        let changes = if before != after {
            let parent = fetch_parent(api, &planned.parent).await?;
            Some(reconcile::plan_update(&parent.parameters, &before, &after)?)
        } else {
            None
        };

        let mut applied = prior;

        if planned.name != applied.name {
            api.set_project_field(&id, "name", &planned.name)
                .await
                .map_err(|e| applied.partial(e))?;
            info!(id = %id, "Renamed project");
            applied.name = planned.name.clone();
        }

        if planned.description != applied.description {
            api.set_project_description(&id, &planned.description)
                .await
                .map_err(|e| applied.partial(e))?;
            info!(id = %id, "Updated project description");
            applied.description = planned.description.clone();
        }

        if let Some(changes) = changes {
            for name in &changes.delete {
                api.delete_project_parameter(&id, name)
                    .await
                    .map_err(|e| applied.partial(e))?;
                applied.parameter.retain(|d| &d.name != name);
            }
            for (name, parameter) in &changes.replace {
                api.replace_project_parameter(&id, name, parameter)
                    .await
                    .map_err(|e| applied.partial(e))?;
            }
            info!(
                id = %id,
                deleted = changes.delete.len(),
                replaced = changes.replace.len(),
                "Updated project parameters"
            );
        }

        planned.to_value()
    }

    async fn delete(&self, api: &dyn TeamcityApi, current: Value) -> Result<(), ProviderError> {
        let current: ProjectState = from_state(current)?;
        let id = current.remote_id()?;
        api.delete_project(id).await?;
        info!(id, "Deleted project");
        Ok(())
    }

    async fn import(&self, api: &dyn TeamcityApi, id: &str) -> Result<Value, ProviderError> {
        let state = read_project(api, &ProjectState::with_id(id))
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("project {}", id)))?;
        info!(id, "Imported project");
        to_state(&state)
    }
}
