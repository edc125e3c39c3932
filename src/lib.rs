//! Hemmer provider for TeamCity.
//!
//! Manages TeamCity projects (with their parameters) and agent pool
//! attachments. The hosting framework drives the lifecycle through
//! [`ProviderService`]; [`TeamcityProvider`] implements it on top of the
//! TeamCity REST API.
//!
//! # Resources
//!
//! - `teamcity_project`: `parent`, `name`, `description`, a `parameter` block
//!   of definitions owned by the project, and `parameter_values` for plain
//!   value overrides.
//! - `teamcity_agent_pool_project_attachment`: `pool` and `project`.
//!
//! # Parameters
//!
//! TeamCity reports a project's parameters as one merged view of its own
//! definitions and everything inherited. The [`parameter::reconcile`] module
//! splits that view back into configuration by comparing it with the parent
//! project's view, and computes the minimal remote changes on update.
//!
//! # Usage
//!
//! ```no_run
//! use hemmer_provider_teamcity::{init_logging, ProviderService, TeamcityProvider};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), hemmer_provider_teamcity::ProviderError> {
//! init_logging();
//! let provider = TeamcityProvider::new();
//! provider
//!     .configure(json!({
//!         "address": "https://teamcity.example.com",
//!         "username": "admin",
//!         "password": "secret"
//!     }))
//!     .await?;
//!
//! let plan = provider
//!     .plan("teamcity_project", None, json!({"name": "Backend"}), json!({}))
//!     .await?;
//! let state = provider.create("teamcity_project", plan.planned_state).await?;
//! println!("created {}", state["id"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod parameter;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod testing;
pub mod types;
pub mod validation;

pub use client::{HttpClient, TeamcityApi};
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use parameter::{Parameter, ParameterSpec, Parameters};
pub use provider::{ProviderService, TeamcityProvider};
pub use resources::{Resource, ResourceRegistry};
pub use schema::{Diagnostic, ProviderSchema};
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata};
pub use validation::{validate, validate_result};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
