//! Testing utilities.
//!
//! [`FakeTeamcity`] is an in-memory [`TeamcityApi`] that behaves like the
//! server where it matters to the provider: projects form a hierarchy, reads
//! return the merged parameter view with password values redacted, and every
//! mutating call is recorded so tests can assert on ordering.
//!
//! [`ProviderTester`] drives a [`ProviderService`] through its lifecycle
//! without a host.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hemmer_provider_teamcity::testing::{FakeTeamcity, ProviderTester};
//! use hemmer_provider_teamcity::TeamcityProvider;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(FakeTeamcity::new());
//! let tester = ProviderTester::new(TeamcityProvider::with_api(api.clone()));
//!
//! let state = tester
//!     .lifecycle_create("teamcity_project", json!({"name": "Backend"}))
//!     .await
//!     .unwrap();
//! assert_eq!(state["id"], "Backend");
//! assert_eq!(api.calls().len(), 2);
//! # });
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;

use crate::client::{AgentPool, NewProject, Project, ProjectRef, TeamcityApi};
use crate::error::ProviderError;
use crate::parameter::{Parameter, Parameters};
use crate::provider::ProviderService;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult};
use crate::validation::ROOT_PROJECT_ID;

/// Drives a [`ProviderService`] the way a host would, minus persistence.
///
/// Plans pass the proposed state as the raw config too, which is all the
/// TeamCity resources look at.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Shortcut for `provider().schema()`.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Registered resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Validate the provider block; error diagnostics become [`TestError::Diagnostics`].
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.validate_provider_config(config).await?)
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        errors_only(self.provider.configure(config).await?)
    }

    /// Validate one resource block; error diagnostics become [`TestError::Diagnostics`].
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        errors_only(diagnostics)
    }

    /// Plan with no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, config.clone(), config)
            .await
    }

    /// Plan `prior_state` towards `config`.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), config.clone(), config)
            .await
    }

    /// Plan the destruction of `prior_state`.
    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    /// See [`ProviderService::create`].
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// See [`ProviderService::read`].
    pub async fn read(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// See [`ProviderService::update`].
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior_state, planned_state).await
    }

    /// See [`ProviderService::delete`].
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// See [`ProviderService::import_resource`].
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Plan, create and refresh. Returns the refreshed state.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let planned = self.plan_create(resource_type, config).await?.planned_state;
        let state = self.create(resource_type, planned).await?;
        self.refresh(resource_type, state).await
    }

    /// Plan, update and refresh. Returns the refreshed state.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let planned = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?
            .planned_state;
        let state = self.update(resource_type, prior_state, planned).await?;
        self.refresh(resource_type, state).await
    }

    /// Plan a destroy, then delete.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, state.clone()).await?;
        self.delete(resource_type, state).await
    }

    /// Create from `initial`, update to `updated`, then delete. Returns the
    /// refreshed state seen after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial: Value,
        updated: Value,
    ) -> Result<Value, ProviderError> {
        let state = self.lifecycle_create(resource_type, initial).await?;
        let state = self.lifecycle_update(resource_type, state, updated).await?;
        self.lifecycle_delete(resource_type, state.clone()).await?;
        Ok(state)
    }

    async fn refresh(&self, resource_type: &str, state: Value) -> Result<Value, ProviderError> {
        self.read(resource_type, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("{} disappeared after apply", resource_type))
        })
    }
}

/// Failure of a [`ProviderTester`] call that reports diagnostics.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Error diagnostics, warnings dropped.
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// The call itself failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let mut line = d.summary.clone();
            if let Some(detail) = &d.detail {
                line = format!("{}: {}", line, detail);
            }
            if let Some(attribute) = &d.attribute {
                line = format!("{} [{}]", line, attribute);
            }
            line
        })
        .collect::<Vec<_>>()
        .join("; ")
}

fn errors_only(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        return Ok(());
    }
    Err(TestError::Diagnostics(errors))
}

fn changed_paths(plan: &PlanResult) -> Vec<&str> {
    plan.changes.iter().map(|c| c.path.as_str()).collect()
}

/// Panics unless `plan` is a fresh create.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "create plan has no changes");
    assert!(!plan.requires_replace, "create plan asks for replacement");
}

/// Panics if `plan` changes anything.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(plan.changes.is_empty(), "unexpected changes to {:?}", changed_paths(plan));
}

/// Panics unless `plan` replaces the resource.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "plan updates in place, expected replacement of {:?}",
        changed_paths(plan)
    );
}

/// Panics unless `plan` changes something without replacing.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "plan has no changes");
    assert!(
        !plan.requires_replace,
        "plan replaces, expected an in-place update of {:?}",
        changed_paths(plan)
    );
}

/// Panics unless `plan` touches `path`.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    let paths = changed_paths(plan);
    assert!(paths.contains(&path), "'{}' not among changed {:?}", path, paths);
}

/// Panics if `plan` touches `path`.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(!changed_paths(plan).contains(&path), "'{}' unexpectedly changed", path);
}

/// Panics unless some error diagnostic's summary contains `needle`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let summaries: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        summaries.iter().any(|s| s.contains(needle)),
        "no error mentions '{}' in {:?}",
        needle,
        summaries
    );
}

/// A [`FakeTeamcity`] operation, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    /// [`TeamcityApi::create_project`]
    CreateProject,
    /// [`TeamcityApi::get_project`]
    GetProject,
    /// [`TeamcityApi::set_project_field`]
    SetProjectField,
    /// [`TeamcityApi::set_project_description`]
    SetProjectDescription,
    /// [`TeamcityApi::delete_project`]
    DeleteProject,
    /// [`TeamcityApi::replace_all_project_parameters`]
    ReplaceAllParameters,
    /// [`TeamcityApi::replace_project_parameter`]
    ReplaceParameter,
    /// [`TeamcityApi::delete_project_parameter`]
    DeleteParameter,
    /// [`TeamcityApi::get_agent_pool`]
    GetAgentPool,
    /// [`TeamcityApi::create_agent_pool_project_attachment`]
    AttachProject,
    /// [`TeamcityApi::delete_agent_pool_project_attachment`]
    DetachProject,
}

/// A mutating call recorded by [`FakeTeamcity`]. Parameter values are not
/// recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ApiCall {
    CreateProject { name: String, parent: String },
    SetProjectField { id: String, field: String, value: String },
    SetProjectDescription { id: String, description: String },
    DeleteProject { id: String },
    ReplaceAllParameters { id: String, names: Vec<String> },
    ReplaceParameter { id: String, name: String },
    DeleteParameter { id: String, name: String },
    AttachProject { pool: i64, project: String },
    DetachProject { pool: i64, project: String },
}

#[derive(Debug, Clone)]
struct FakeProject {
    name: String,
    description: String,
    parent: Option<String>,
    parameters: Parameters,
}

#[derive(Debug, Default)]
struct FakeState {
    projects: BTreeMap<String, FakeProject>,
    pools: BTreeMap<i64, AgentPool>,
    calls: Vec<ApiCall>,
    failures: BTreeSet<Operation>,
}

impl FakeState {
    fn fail_if_injected(&self, operation: Operation) -> Result<(), ProviderError> {
        if self.failures.contains(&operation) {
            return Err(ProviderError::Api {
                status: 500,
                message: format!("injected failure in {:?}", operation),
            });
        }
        Ok(())
    }

    fn project_mut(&mut self, id: &str) -> Result<&mut FakeProject, ProviderError> {
        self.projects
            .get_mut(id)
            .ok_or_else(|| ProviderError::NotFound(format!("project {}", id)))
    }

    /// Parameters as the server reports them: ancestors first, each level
    /// layered on top. A plain value set over an inherited definition keeps
    /// that definition's spec.
    fn effective_parameters(&self, id: &str) -> Parameters {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let Some(project) = self.projects.get(current) else {
                break;
            };
            chain.push(project);
            cursor = project.parent.as_deref();
        }

        let mut merged = Parameters::new();
        for project in chain.into_iter().rev() {
            for (name, parameter) in &project.parameters {
                let layered = match (&parameter.spec, merged.get(name)) {
                    (None, Some(inherited)) => {
                        inherited.clone().with_value(parameter.value.clone())
                    }
                    _ => parameter.clone(),
                };
                merged.insert(name.clone(), layered);
            }
        }

        for parameter in merged.values_mut() {
            if parameter.is_secret() {
                parameter.value.clear();
            }
        }
        merged
    }
}

/// In-memory TeamCity server.
///
/// Starts with only the root project. Project ids for created projects are
/// derived from the parent id and the name, the way TeamCity suggests them.
#[derive(Debug)]
pub struct FakeTeamcity {
    state: Mutex<FakeState>,
}

impl Default for FakeTeamcity {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeTeamcity {
    /// A server with just the root project.
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.projects.insert(
            ROOT_PROJECT_ID.to_string(),
            FakeProject {
                name: "<Root project>".to_string(),
                description: String::new(),
                parent: None,
                parameters: Parameters::new(),
            },
        );
        Self {
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a project under `parent`.
    pub fn with_project(self, id: &str, name: &str, parent: &str) -> Self {
        self.state().projects.insert(
            id.to_string(),
            FakeProject {
                name: name.to_string(),
                description: String::new(),
                parent: Some(parent.to_string()),
                parameters: Parameters::new(),
            },
        );
        self
    }

    /// Add an own parameter to an existing project.
    pub fn with_parameter(self, project: &str, name: &str, parameter: Parameter) -> Self {
        self.set_parameter(project, name, parameter);
        self
    }

    /// Add an empty agent pool.
    pub fn with_agent_pool(self, id: i64, name: &str) -> Self {
        self.state().pools.insert(
            id,
            AgentPool {
                id,
                name: name.to_string(),
                projects: BTreeMap::new(),
            },
        );
        self
    }

    /// Make every call of `operation` fail with a 500.
    pub fn fail_on(self, operation: Operation) -> Self {
        self.state().failures.insert(operation);
        self
    }

    /// Set an own parameter behind the provider's back. Not recorded.
    pub fn set_parameter(&self, project: &str, name: &str, parameter: Parameter) {
        if let Some(p) = self.state().projects.get_mut(project) {
            p.parameters.insert(name.to_string(), parameter);
        }
    }

    /// Delete a project behind the provider's back. Not recorded.
    pub fn remove_project(&self, id: &str) {
        self.state().projects.remove(id);
    }

    /// Own parameters of a project, unredacted.
    pub fn own_parameters(&self, project: &str) -> Parameters {
        self.state()
            .projects
            .get(project)
            .map(|p| p.parameters.clone())
            .unwrap_or_default()
    }

    /// Whether `project` is attached to `pool`.
    pub fn has_attachment(&self, pool: i64, project: &str) -> bool {
        self.state()
            .pools
            .get(&pool)
            .is_some_and(|p| p.projects.contains_key(project))
    }

    /// Mutating calls so far, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }
}

fn suggest_id(parent: &str, name: &str) -> String {
    let base: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let base = match base.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => base,
        _ => format!("Project{}", base),
    };
    if parent == ROOT_PROJECT_ID {
        base
    } else {
        format!("{}_{}", parent, base)
    }
}

#[async_trait]
impl TeamcityApi for FakeTeamcity {
    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::CreateProject)?;
        state.calls.push(ApiCall::CreateProject {
            name: project.name.clone(),
            parent: project.parent_project_id.clone(),
        });

        if !state.projects.contains_key(&project.parent_project_id) {
            return Err(ProviderError::NotFound(format!(
                "project {}",
                project.parent_project_id
            )));
        }
        let id = suggest_id(&project.parent_project_id, &project.name);
        if state.projects.contains_key(&id) {
            return Err(ProviderError::Api {
                status: 409,
                message: format!("Project ID \"{}\" is already used by another project", id),
            });
        }

        state.projects.insert(
            id.clone(),
            FakeProject {
                name: project.name.clone(),
                description: String::new(),
                parent: Some(project.parent_project_id.clone()),
                parameters: Parameters::new(),
            },
        );
        Ok(Project {
            parameters: state.effective_parameters(&id),
            id,
            name: project.name.clone(),
            description: String::new(),
            parent_project_id: project.parent_project_id.clone(),
        })
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, ProviderError> {
        let state = self.state();
        state.fail_if_injected(Operation::GetProject)?;
        Ok(state.projects.get(id).map(|p| Project {
            id: id.to_string(),
            name: p.name.clone(),
            description: p.description.clone(),
            parent_project_id: p.parent.clone().unwrap_or_default(),
            parameters: state.effective_parameters(id),
        }))
    }

    async fn set_project_field(
        &self,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::SetProjectField)?;
        state.calls.push(ApiCall::SetProjectField {
            id: id.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        });
        let project = state.project_mut(id)?;
        match field {
            "name" => project.name = value.to_string(),
            "description" => project.description = value.to_string(),
            other => {
                return Err(ProviderError::Api {
                    status: 400,
                    message: format!("Field '{}' is not supported", other),
                })
            }
        }
        Ok(())
    }

    async fn set_project_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::SetProjectDescription)?;
        state.calls.push(ApiCall::SetProjectDescription {
            id: id.to_string(),
            description: description.to_string(),
        });
        state.project_mut(id)?.description = description.to_string();
        Ok(())
    }

    async fn delete_project(&self, id: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::DeleteProject)?;
        state.calls.push(ApiCall::DeleteProject { id: id.to_string() });
        state
            .projects
            .remove(id)
            .ok_or_else(|| ProviderError::NotFound(format!("project {}", id)))?;
        for pool in state.pools.values_mut() {
            pool.projects.remove(id);
        }
        Ok(())
    }

    async fn replace_all_project_parameters(
        &self,
        id: &str,
        parameters: &Parameters,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::ReplaceAllParameters)?;
        state.calls.push(ApiCall::ReplaceAllParameters {
            id: id.to_string(),
            names: parameters.keys().cloned().collect(),
        });
        state.project_mut(id)?.parameters = parameters.clone();
        Ok(())
    }

    async fn replace_project_parameter(
        &self,
        id: &str,
        name: &str,
        parameter: &Parameter,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::ReplaceParameter)?;
        state.calls.push(ApiCall::ReplaceParameter {
            id: id.to_string(),
            name: name.to_string(),
        });
        state
            .project_mut(id)?
            .parameters
            .insert(name.to_string(), parameter.clone());
        Ok(())
    }

    async fn delete_project_parameter(&self, id: &str, name: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::DeleteParameter)?;
        state.calls.push(ApiCall::DeleteParameter {
            id: id.to_string(),
            name: name.to_string(),
        });
        state
            .project_mut(id)?
            .parameters
            .remove(name)
            .map(drop)
            .ok_or_else(|| ProviderError::NotFound(format!("parameter {} of {}", name, id)))
    }

    async fn get_agent_pool(&self, pool_id: i64) -> Result<AgentPool, ProviderError> {
        let state = self.state();
        state.fail_if_injected(Operation::GetAgentPool)?;
        state
            .pools
            .get(&pool_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("agent pool {}", pool_id)))
    }

    async fn create_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::AttachProject)?;
        state.calls.push(ApiCall::AttachProject {
            pool: pool_id,
            project: project_id.to_string(),
        });
        let name = state
            .projects
            .get(project_id)
            .map(|p| p.name.clone())
            .ok_or_else(|| ProviderError::NotFound(format!("project {}", project_id)))?;
        let pool = state
            .pools
            .get_mut(&pool_id)
            .ok_or_else(|| ProviderError::NotFound(format!("agent pool {}", pool_id)))?;
        pool.projects.insert(
            project_id.to_string(),
            ProjectRef {
                id: project_id.to_string(),
                name,
            },
        );
        Ok(())
    }

    async fn delete_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.fail_if_injected(Operation::DetachProject)?;
        state.calls.push(ApiCall::DetachProject {
            pool: pool_id,
            project: project_id.to_string(),
        });
        state
            .pools
            .get_mut(&pool_id)
            .and_then(|p| p.projects.remove(project_id))
            .map(drop)
            .ok_or_else(|| {
                ProviderError::NotFound(format!("project {} in agent pool {}", project_id, pool_id))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ParameterSpec;
    use crate::provider::TeamcityProvider;
    use serde_json::json;
    use std::sync::Arc;
    use tokio_test::assert_ok;

    fn tester(api: &Arc<FakeTeamcity>) -> ProviderTester<TeamcityProvider> {
        ProviderTester::new(TeamcityProvider::with_api(api.clone()))
    }

    #[tokio::test]
    async fn test_effective_view_layers_and_redacts() {
        let api = FakeTeamcity::new()
            .with_project("Platform", "Platform", ROOT_PROJECT_ID)
            .with_parameter("_Root", "R", Parameter::value_only("r"))
            .with_parameter("Platform", "A", Parameter::owned("1", ParameterSpec::text()))
            .with_parameter("Platform", "S", Parameter::owned("s", ParameterSpec::password()))
            .with_project("Web", "Web", "Platform")
            .with_parameter("Web", "A", Parameter::value_only("2"));

        let web = api.get_project("Web").await.unwrap().unwrap();
        assert_eq!(web.parameters["A"], Parameter::owned("2", ParameterSpec::text()));
        assert_eq!(web.parameters["R"], Parameter::value_only("r"));
        assert_eq!(web.parameters["S"].value, "");
        assert_eq!(api.own_parameters("Platform")["S"].value, "s");
    }

    #[tokio::test]
    async fn test_created_ids() {
        let api = FakeTeamcity::new().with_project("Platform", "Platform", ROOT_PROJECT_ID);
        let new = |name: &str, parent: &str| NewProject {
            name: name.to_string(),
            parent_project_id: parent.to_string(),
        };

        let p = api.create_project(&new("Web App", "Platform")).await.unwrap();
        assert_eq!(p.id, "Platform_WebApp");
        let p = api.create_project(&new("2fa", ROOT_PROJECT_ID)).await.unwrap();
        assert_eq!(p.id, "Project2fa");

        let err = api
            .create_project(&new("Web App", "Platform"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let api = FakeTeamcity::new().fail_on(Operation::GetProject);
        let err = api.get_project("_Root").await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_tester_lifecycle_crud() {
        let api = Arc::new(FakeTeamcity::new());
        let tester = tester(&api);

        let updated = assert_ok!(
            tester
                .lifecycle_crud(
                    "teamcity_project",
                    json!({"name": "Backend", "parameter_values": {"env.A": "1"}}),
                    json!({
                        "name": "Backend",
                        "description": "d",
                        "parameter_values": {"env.A": "2"}
                    }),
                )
                .await
        );
        assert_eq!(updated["description"], "d");
        assert_eq!(updated["parameter_values"], json!({"env.A": "2"}));
        assert_eq!(
            api.calls().last(),
            Some(&ApiCall::DeleteProject {
                id: "Backend".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_tester_attachment_lifecycle() {
        let api = Arc::new(
            FakeTeamcity::new()
                .with_project("Backend", "Backend", ROOT_PROJECT_ID)
                .with_agent_pool(1, "Default"),
        );
        let tester = tester(&api);

        let state = assert_ok!(
            tester
                .lifecycle_create(
                    "teamcity_agent_pool_project_attachment",
                    json!({"pool": 1, "project": "Backend"}),
                )
                .await
        );
        assert_eq!(state["id"], "1_Backend");

        let plan = tester
            .plan_update(
                "teamcity_agent_pool_project_attachment",
                state.clone(),
                json!({"pool": 1, "project": "Backend"}),
            )
            .await
            .unwrap();
        assert_plan_no_changes(&plan);

        assert_ok!(
            tester
                .lifecycle_delete("teamcity_agent_pool_project_attachment", state)
                .await
        );
        assert!(!api.has_attachment(1, "Backend"));
    }

    #[tokio::test]
    async fn test_tester_validation() {
        let api = Arc::new(FakeTeamcity::new());
        let tester = tester(&api);
        assert!(tester.resource_types().contains(&"teamcity_project".to_string()));
        assert!(tester.schema().resources.contains_key("teamcity_project"));

        assert_ok!(
            tester
                .validate_resource_config("teamcity_project", json!({"name": "Backend"}))
                .await
        );
        match tester
            .validate_resource_config(
                "teamcity_project",
                json!({"name": "Backend", "parameter": [{"name": "a"}, {"name": "a"}]}),
            )
            .await
        {
            Err(TestError::Diagnostics(diagnostics)) => {
                assert_error_contains(&diagnostics, "Duplicate parameter 'a'")
            }
            other => panic!("expected diagnostics, got {:?}", other),
        }

        let result = tester
            .validate_provider_config(json!({"address": 8111, "username": "u", "password": "p"}))
            .await;
        assert!(matches!(result, Err(TestError::Diagnostics(_))));
    }

    #[test]
    fn test_error_rendering() {
        let err = TestError::Diagnostics(vec![
            Diagnostic::error("Invalid id").with_attribute("parent"),
            Diagnostic::error("Missing address").with_detail("set TEAMCITY_ADDR"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid id [parent]; Missing address: set TEAMCITY_ADDR"
        );

        let err = TestError::from(ProviderError::NotFound("Backend".to_string()));
        assert!(err.to_string().contains("Backend"));
    }
}
