//! The provider surface driven by the hosting framework.
//!
//! [`ProviderService`] is the lifecycle seam: the host calls it with
//! loosely-typed JSON and persists whatever state comes back.
//! [`TeamcityProvider`] implements it by dispatching into a
//! [`ResourceRegistry`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{HttpClient, TeamcityApi};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::resources::{plan_resource, ResourceRegistry};
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::types::{ImportedResource, PlanResult, ProviderMetadata};

/// Lifecycle operations a provider exposes to its host.
///
/// # Example
///
/// ```
/// use hemmer_provider_teamcity::{ProviderService, TeamcityProvider};
///
/// let provider = TeamcityProvider::new();
/// let schema = provider.schema();
/// assert!(schema.resources.contains_key("teamcity_project"));
/// ```
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// The provider configuration schema and every resource schema.
    fn schema(&self) -> ProviderSchema;

    /// Resource type names, derived from the schema by default.
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.schema().resources.keys().cloned().collect(),
        }
    }

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure credentials and connection settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource configuration before planning.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Plan a create (`prior_state` is `None`), update, or delete
    /// (`proposed_state` is `Null`).
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Refresh a resource. `None` means it no longer exists and its identity
    /// should be cleared.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import existing infrastructure into management.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// The TeamCity provider.
pub struct TeamcityProvider {
    registry: ResourceRegistry,
    api: RwLock<Option<Arc<dyn TeamcityApi>>>,
}

impl Default for TeamcityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TeamcityProvider {
    /// An unconfigured provider with every resource type registered.
    pub fn new() -> Self {
        Self {
            registry: ResourceRegistry::teamcity(),
            api: RwLock::new(None),
        }
    }

    /// A provider already connected to `api`.
    pub fn with_api(api: Arc<dyn TeamcityApi>) -> Self {
        Self {
            registry: ResourceRegistry::teamcity(),
            api: RwLock::new(Some(api)),
        }
    }

    /// The registered resource adapters.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    async fn api(&self) -> Result<Arc<dyn TeamcityApi>, ProviderError> {
        self.api.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider is not configured".to_string())
        })
    }
}

#[async_trait::async_trait]
impl ProviderService for TeamcityProvider {
    fn schema(&self) -> ProviderSchema {
        self.registry
            .schemas()
            .into_iter()
            .fold(
                ProviderSchema::new().with_provider_config(ProviderConfig::schema()),
                |schema, (name, resource)| schema.with_resource(name, resource),
            )
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            resources: self.registry.names(),
        }
    }

    #[instrument(skip(self, config))]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = crate::validation::validate(&ProviderConfig::schema(), &config);
        if let Err(missing) = ProviderConfig::resolve(&config) {
            diagnostics.extend(missing);
        }
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "Provider configuration is invalid");
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let config = match ProviderConfig::resolve(&config) {
            Ok(config) => config,
            Err(diagnostics) => {
                warn!(diagnostics = diagnostics.len(), "Provider configuration is invalid");
                return Ok(diagnostics);
            }
        };

        let client = HttpClient::new(&config)?;
        info!(address = %client.base_url(), username = %config.username, "Configured provider");
        *self.api.write().await = Some(Arc::new(client));
        Ok(vec![])
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), ProviderError> {
        self.api.write().await.take();
        info!("Provider stopped");
        Ok(())
    }

    #[instrument(skip(self, config))]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.registry.get(resource_type)?.validate(&config);
        debug!(diagnostics = diagnostics.len(), "Validated resource configuration");
        Ok(diagnostics)
    }

    #[instrument(skip(self, prior_state, proposed_state, _config))]
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let plan = plan_resource(resource, prior_state, proposed_state)?;
        debug!(
            changes = plan.changes.len(),
            requires_replace = plan.requires_replace,
            "Planned resource"
        );
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let api = self.api().await?;
        resource
            .create(api.as_ref(), planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "Create failed"))
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let api = self.api().await?;
        resource
            .read(api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(error = %e, "Read failed"))
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let api = self.api().await?;
        resource
            .update(api.as_ref(), prior_state, planned_state)
            .await
            .inspect_err(|e| error!(error = %e, "Update failed"))
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let api = self.api().await?;
        resource
            .delete(api.as_ref(), current_state)
            .await
            .inspect_err(|e| error!(error = %e, "Delete failed"))
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.registry.get(resource_type)?;
        let api = self.api().await?;
        let state = resource.import(api.as_ref(), id).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
