//! `teamcity_agent_pool_project_attachment`: membership of a project in an agent pool.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{from_state, to_state, Resource};
use crate::client::TeamcityApi;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Typed configuration and state of an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentState {
    /// `"{pool}_{project}"`, absent until created.
    #[serde(default)]
    pub id: Option<String>,
    /// Agent pool id.
    pub pool: i64,
    /// Project id.
    pub project: String,
}

impl AttachmentState {
    fn composite_id(&self) -> String {
        format!("{}_{}", self.pool, self.project)
    }
}

/// Adapter for `teamcity_agent_pool_project_attachment`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentPoolProjectAttachmentResource;

impl AgentPoolProjectAttachmentResource {
    /// Resource type name.
    pub const TYPE_NAME: &'static str = "teamcity_agent_pool_project_attachment";
}

#[async_trait]
impl Resource for AgentPoolProjectAttachmentResource {
    fn type_name(&self) -> &'static str {
        Self::TYPE_NAME
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute("id", Attribute::computed_string())
            .with_attribute(
                "pool",
                Attribute::required_int64()
                    .with_force_new()
                    .with_description("Agent pool id."),
            )
            .with_attribute(
                "project",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Id of the project to attach."),
            )
    }

    fn normalize(&self, state: Value) -> Result<Value, ProviderError> {
        to_state(&from_state::<AttachmentState>(state)?)
    }

    async fn create(&self, api: &dyn TeamcityApi, planned: Value) -> Result<Value, ProviderError> {
        let mut state: AttachmentState = from_state(planned)?;
        api.create_agent_pool_project_attachment(state.pool, &state.project)
            .await?;
        state.id = Some(state.composite_id());
        info!(pool = state.pool, project = %state.project, "Created agent pool attachment");
        to_state(&state)
    }

    async fn read(
        &self,
        api: &dyn TeamcityApi,
        current: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state: AttachmentState = from_state(current)?;
        let pool = api.get_agent_pool(state.pool).await?;
        debug!(pool = pool.id, projects = pool.projects.len(), "Read agent pool");

        if !pool.projects.contains_key(&state.project) {
            info!(
                pool = state.pool,
                project = %state.project,
                "Agent pool attachment no longer exists"
            );
            return Ok(None);
        }
        Ok(Some(to_state(&state)?))
    }

    async fn delete(&self, api: &dyn TeamcityApi, current: Value) -> Result<(), ProviderError> {
        let state: AttachmentState = from_state(current)?;
        api.delete_agent_pool_project_attachment(state.pool, &state.project)
            .await?;
        info!(pool = state.pool, project = %state.project, "Deleted agent pool attachment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ApiCall, FakeTeamcity};
    use serde_json::json;
    use tokio_test::assert_ok;

    fn fake() -> FakeTeamcity {
        FakeTeamcity::new()
            .with_project("Backend", "Backend", "_Root")
            .with_agent_pool(3, "Linux")
    }

    #[tokio::test]
    async fn test_create_read_delete() {
        let api = fake();
        let resource = AgentPoolProjectAttachmentResource;

        let state = assert_ok!(
            resource
                .create(&api, json!({"pool": 3, "project": "Backend"}))
                .await
        );
        assert_eq!(state["id"], "3_Backend");
        assert!(api.has_attachment(3, "Backend"));
        assert_eq!(
            api.calls(),
            vec![ApiCall::AttachProject {
                pool: 3,
                project: "Backend".to_string()
            }]
        );

        let read = assert_ok!(resource.read(&api, state.clone()).await);
        assert_eq!(read, Some(state.clone()));

        assert_ok!(resource.delete(&api, state.clone()).await);
        assert!(!api.has_attachment(3, "Backend"));

        let read = assert_ok!(resource.read(&api, state).await);
        assert_eq!(read, None);
    }

    #[tokio::test]
    async fn test_create_failures_pass_through() {
        let api = fake();
        let resource = AgentPoolProjectAttachmentResource;

        let err = resource
            .create(&api, json!({"pool": 9, "project": "Backend"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = resource
            .create(&api, json!({"pool": 3, "project": 7}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[tokio::test]
    async fn test_read_missing_pool_fails() {
        let api = fake();
        let err = AgentPoolProjectAttachmentResource
            .read(&api, json!({"id": "9_Backend", "pool": 9, "project": "Backend"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_and_import_unsupported() {
        let api = fake();
        let resource = AgentPoolProjectAttachmentResource;
        let state = json!({"id": "3_Backend", "pool": 3, "project": "Backend"});

        let err = resource
            .update(&api, state.clone(), state)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest(_)));

        let err = resource.import(&api, "3_Backend").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unimplemented(_)));
    }

    #[test]
    fn test_validate() {
        let resource = AgentPoolProjectAttachmentResource;
        assert!(resource
            .validate(&json!({"pool": 3, "project": "Backend"}))
            .is_empty());
        let diagnostics = resource.validate(&json!({"pool": "3"}));
        assert_eq!(diagnostics.len(), 2);
    }
}
