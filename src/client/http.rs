//! [`TeamcityApi`] over the TeamCity REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use super::wire::{
    AgentPoolDto, NewProjectDto, ProjectDto, ProjectRefDto, PropertiesDto, PropertyDto,
};
use super::{AgentPool, NewProject, Project, TeamcityApi};
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::parameter::{Parameter, Parameters};

/// REST client authenticated with basic auth.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base: Url,
    username: String,
    password: String,
}

impl HttpClient {
    /// Build a client for the configured server.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let base = Url::parse(&config.address).map_err(|e| {
            ProviderError::Configuration(format!("invalid address '{}': {}", config.address, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "address '{}' cannot be used as a base URL",
                config.address
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `<base>/app/rest/<segments...>`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["app", "rest"]).extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.url(segments);
        debug!(%method, %url, "TeamCity request");
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match response.text().await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(status = status.as_u16(), error = %e, "Could not read error response body");
                None
            }
        };
        warn!(status = status.as_u16(), "TeamCity request failed");
        Err(status_error(status, body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ProviderError> {
        let body = self.send(request).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    fn put_text(&self, segments: &[&str], value: &str) -> RequestBuilder {
        self.request(Method::PUT, segments)
            .header(CONTENT_TYPE, "text/plain")
            .header(ACCEPT, "text/plain")
            .body(value.to_string())
    }
}

/// Error for a failed response. An empty or unreadable body falls back to the
/// status reason.
fn status_error(status: StatusCode, body: Option<String>) -> ProviderError {
    let message = body
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("no response body").to_string());
    if status == StatusCode::NOT_FOUND {
        return ProviderError::NotFound(message);
    }
    ProviderError::Api {
        status: status.as_u16(),
        message,
    }
}

fn locator(id: &str) -> String {
    format!("id:{}", id)
}

#[async_trait]
impl TeamcityApi for HttpClient {
    async fn create_project(&self, project: &NewProject) -> Result<Project, ProviderError> {
        let body = NewProjectDto::from(project);
        let dto: ProjectDto = self
            .send_json(self.request(Method::POST, &["projects"]).json(&body))
            .await?;
        info!(id = %dto.id, name = %project.name, "Created project");
        Ok(dto.into())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>, ProviderError> {
        let request = self.request(Method::GET, &["projects", &locator(id)]);
        match self.send_json::<ProjectDto>(request).await {
            Ok(dto) => Ok(Some(dto.into())),
            Err(e) if e.is_not_found() => {
                debug!(id, "Project not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn set_project_field(
        &self,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<(), ProviderError> {
        self.send(self.put_text(&["projects", &locator(id), field], value))
            .await?;
        debug!(id, field, "Updated project field");
        Ok(())
    }

    async fn set_project_description(
        &self,
        id: &str,
        description: &str,
    ) -> Result<(), ProviderError> {
        self.set_project_field(id, "description", description).await
    }

    async fn delete_project(&self, id: &str) -> Result<(), ProviderError> {
        self.send(self.request(Method::DELETE, &["projects", &locator(id)]))
            .await?;
        info!(id, "Deleted project");
        Ok(())
    }

    async fn replace_all_project_parameters(
        &self,
        id: &str,
        parameters: &Parameters,
    ) -> Result<(), ProviderError> {
        let body = PropertiesDto::from(parameters);
        self.send(
            self.request(Method::PUT, &["projects", &locator(id), "parameters"])
                .json(&body),
        )
        .await?;
        debug!(id, count = parameters.len(), "Replaced project parameters");
        Ok(())
    }

    async fn replace_project_parameter(
        &self,
        id: &str,
        name: &str,
        parameter: &Parameter,
    ) -> Result<(), ProviderError> {
        let body = PropertyDto::new(name, parameter);
        self.send(
            self.request(Method::PUT, &["projects", &locator(id), "parameters", name])
                .json(&body),
        )
        .await?;
        debug!(id, name, "Replaced project parameter");
        Ok(())
    }

    async fn delete_project_parameter(&self, id: &str, name: &str) -> Result<(), ProviderError> {
        self.send(self.request(
            Method::DELETE,
            &["projects", &locator(id), "parameters", name],
        ))
        .await?;
        debug!(id, name, "Deleted project parameter");
        Ok(())
    }

    async fn get_agent_pool(&self, pool_id: i64) -> Result<AgentPool, ProviderError> {
        let dto: AgentPoolDto = self
            .send_json(self.request(Method::GET, &["agentPools", &locator(&pool_id.to_string())]))
            .await?;
        Ok(dto.into())
    }

    async fn create_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError> {
        let body = ProjectRefDto {
            id: project_id.to_string(),
            name: String::new(),
        };
        self.send(
            self.request(
                Method::POST,
                &["agentPools", &locator(&pool_id.to_string()), "projects"],
            )
            .json(&body),
        )
        .await?;
        info!(pool_id, project_id, "Attached project to agent pool");
        Ok(())
    }

    async fn delete_agent_pool_project_attachment(
        &self,
        pool_id: i64,
        project_id: &str,
    ) -> Result<(), ProviderError> {
        self.send(self.request(
            Method::DELETE,
            &[
                "agentPools",
                &locator(&pool_id.to_string()),
                "projects",
                &locator(project_id),
            ],
        ))
        .await?;
        info!(pool_id, project_id, "Detached project from agent pool");
        Ok(())
    }
}
