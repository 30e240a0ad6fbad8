//! REST client for the serverless containers API
//!
//! Bearer token authentication against the public REST endpoints. Errors
//! come back as `{ "code", "message" }` bodies and are mapped onto
//! [`Status`].

use crate::config::YandexConfig;
use crate::error::{Result, YandexError};
use crate::wire::{
    CreateContainerBody, DeployRevisionBody, ListRevisionsResponse, UpdateContainerBody,
    WireContainer, WireOperation, WireStatus,
};
use async_trait::async_trait;
use containerflow_cloud::api::{
    ApiResult, Container, ContainerApi, CreateContainerRequest, DeployRevisionRequest,
    ListRevisionsRequest, OperationPoller, Revision, UpdateContainerRequest,
};
use containerflow_cloud::{Operation, Status, StatusCode};
use serde::de::DeserializeOwned;

const CONTAINERS_PATH: &str = "containers/v1";
const OPERATIONS_PATH: &str = "operations";

/// Client for one Yandex Cloud account
pub struct YandexClient {
    client: reqwest::Client,
    token: String,
    endpoint: String,
    operation_endpoint: String,
}

impl YandexClient {
    pub fn new(config: YandexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            client: reqwest::Client::new(),
            token: config.token,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            operation_endpoint: config.operation_endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Build a client from `YC_TOKEN` and the default endpoints
    pub fn from_env() -> Result<Self> {
        Self::new(YandexConfig::from_env()?)
    }

    fn containers_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.endpoint, CONTAINERS_PATH, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> ApiResult<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(YandexError::from)?;

        let status = response.status();
        let body = response.bytes().await.map_err(YandexError::from)?;

        if !status.is_success() {
            let error = serde_json::from_slice::<WireStatus>(&body)
                .ok()
                .filter(|e| e.code != 0 || !e.message.is_empty());
            let status = match error {
                Some(e) if e.code != 0 => Status::from(e),
                Some(e) => Status::new(StatusCode::from_http(status.as_u16()), e.message),
                None => Status::new(
                    StatusCode::from_http(status.as_u16()),
                    format!("HTTP {}", status),
                ),
            };
            tracing::debug!(%status, "API call rejected");
            return Err(status);
        }

        Ok(serde_json::from_slice(&body).map_err(YandexError::from)?)
    }
}

#[async_trait]
impl ContainerApi for YandexClient {
    async fn create_container(&self, request: CreateContainerRequest) -> ApiResult<Operation> {
        tracing::debug!(name = %request.name, "POST containers");
        let body = CreateContainerBody::from(request);
        let op: WireOperation = self
            .send(self.client.post(self.containers_url("containers")).json(&body))
            .await?;
        Ok(op.into())
    }

    async fn update_container(&self, request: UpdateContainerRequest) -> ApiResult<Operation> {
        tracing::debug!(container_id = %request.container_id, "PATCH container");
        let url = self.containers_url(&format!("containers/{}", request.container_id));
        let body = UpdateContainerBody::from(request);
        let op: WireOperation = self.send(self.client.patch(url).json(&body)).await?;
        Ok(op.into())
    }

    async fn delete_container(&self, container_id: &str) -> ApiResult<Operation> {
        tracing::debug!(container_id, "DELETE container");
        let url = self.containers_url(&format!("containers/{}", container_id));
        let op: WireOperation = self.send(self.client.delete(url)).await?;
        Ok(op.into())
    }

    async fn get_container(&self, container_id: &str) -> ApiResult<Container> {
        let url = self.containers_url(&format!("containers/{}", container_id));
        let container: WireContainer = self.send(self.client.get(url)).await?;
        Ok(container.into())
    }

    async fn list_revisions(&self, request: ListRevisionsRequest) -> ApiResult<Vec<Revision>> {
        let url = self.containers_url("revisions");
        let filter = request.filter();
        let mut revisions = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut query = vec![("containerId", request.container_id.as_str())];
            if let Some(filter) = filter.as_deref() {
                query.push(("filter", filter));
            }
            if !page_token.is_empty() {
                query.push(("pageToken", page_token.as_str()));
            }

            let page: ListRevisionsResponse =
                self.send(self.client.get(&url).query(&query)).await?;
            revisions.extend(page.revisions.into_iter().map(Revision::from));

            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }

        Ok(revisions)
    }

    async fn deploy_revision(&self, request: DeployRevisionRequest) -> ApiResult<Operation> {
        tracing::debug!(container_id = %request.container_id, "POST revisions:deploy");
        let body = DeployRevisionBody::from(request);
        let op: WireOperation = self
            .send(self.client.post(self.containers_url("revisions:deploy")).json(&body))
            .await?;
        Ok(op.into())
    }
}

#[async_trait]
impl OperationPoller for YandexClient {
    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation> {
        let url = format!(
            "{}/{}/{}",
            self.operation_endpoint, OPERATIONS_PATH, operation_id
        );
        let op: WireOperation = self.send(self.client.get(url)).await?;
        Ok(op.into())
    }
}
