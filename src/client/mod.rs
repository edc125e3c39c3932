//! The remote TeamCity API as seen by the resources.
//!
//! [`TeamcityApi`] is the seam between the lifecycle adapters and the server.
//! [`HttpClient`] implements it over the REST API; tests use the in-memory
//! [`crate::testing::FakeTeamcity`].

pub mod http;
pub mod wire;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::parameter::{Parameter, Parameters};

pub use http::HttpClient;

/// A project as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Project {
    /// Server-assigned external id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Description, empty when unset.
    pub description: String,
    /// Id of the parent project.
    pub parent_project_id: String,
    /// Merged view of inherited and own parameters.
    pub parameters: Parameters,
}

/// Request body for project creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    /// Display name.
    pub name: String,
    /// Id of the parent project.
    pub parent_project_id: String,
}

/// Reference to a project inside another object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectRef {
    /// Project id.
    pub id: String,
    /// Project name.
    pub name: String,
}

/// An agent pool and the projects attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentPool {
    /// Numeric pool id.
    pub id: i64,
    /// Pool name.
    pub name: String,
    /// Attached projects keyed by project id.
    pub projects: BTreeMap<String, ProjectRef>,
}

/// Operations the provider needs from TeamCity.
///
/// Failures are returned as-is; no call is retried.
#[async_trait]
pub trait TeamcityApi: Send + Sync {
    /// Create a project and return it with its assigned id.
    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError>;

    /// Fetch a project. `None` when it does not exist.
    async fn get_project(&self, id: &str) -> Result<Option<Project>, ProviderError>;

    /// Set a single project field such as `name`.
    async fn set_project_field(
        &self,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<(), ProviderError>;

    /// Set the project description.
    async fn set_project_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<(), ProviderError>;

    /// Delete a project.
    async fn delete_project(&self, id: &str) -> Result<(), ProviderError>;

    /// Replace every own parameter of a project.
    async fn replace_all_project_parameters(
        &self,
        id: &str,
        parameters: &Parameters,
    ) -> Result<(), ProviderError>;

    /// Create or overwrite one parameter.
    async fn replace_project_parameter(
        &self,
        id: &str,
        name: &str,
        parameter: &Parameter,
    ) -> Result<(), ProviderError>;

    /// Delete one parameter.
    async fn delete_project_parameter(&self, id: &str, name: &str) -> Result<(), ProviderError>;

    /// Fetch an agent pool with its project membership.
    async fn get_agent_pool(&self, pool_id: i64) -> Result<AgentPool, ProviderError>;

    /// Attach a project to an agent pool.
    async fn create_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError>;

    /// Detach a project from an agent pool.
    async fn delete_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError>;
}
