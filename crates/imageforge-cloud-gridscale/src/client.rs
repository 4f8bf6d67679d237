//! gridscale REST API client
//!
//! Thin HTTP layer over the gridscale API. Mutating calls are accepted
//! asynchronously by gridscale and return a request UUID; the client polls
//! `/requests/{uuid}` until the provider reports completion so that callers
//! can treat every call as finished when it returns.

use crate::error::{GridscaleError, Result};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

pub const GRIDSCALE_API_BASE: &str = "https://api.gridscale.io";

const REQUEST_ID_HEADER: &str = "x-request-id";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Connection settings for the gridscale API
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User UUID (`X-Auth-UserId`)
    pub user_id: String,

    /// API token (`X-Auth-Token`)
    pub token: String,

    pub api_url: String,

    /// Upper bound for a single asynchronous request to complete
    pub request_timeout: Duration,

    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            api_url: GRIDSCALE_API_BASE.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create ClientConfig from environment variables
    pub fn from_env() -> Result<Self> {
        let user_id = std::env::var("GRIDSCALE_UUID")
            .map_err(|_| GridscaleError::MissingEnvVar("GRIDSCALE_UUID".to_string()))?;
        let token = std::env::var("GRIDSCALE_TOKEN")
            .map_err(|_| GridscaleError::MissingEnvVar("GRIDSCALE_TOKEN".to_string()))?;

        let mut config = Self::new(user_id, token);
        if let Ok(url) = std::env::var("GRIDSCALE_URL") {
            config.api_url = url;
        }
        Ok(config)
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// gridscale API client
pub struct GridscaleClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl GridscaleClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<ApiReply> {
        let url = self.url(path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("X-Auth-UserId", &self.config.user_id)
            .header("X-Auth-Token", &self.config.token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    if body.trim().is_empty() {
                        status.canonical_reason().unwrap_or("Unknown error").to_string()
                    } else {
                        body.clone()
                    }
                });
            return Err(GridscaleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(ApiReply { request_id, body })
    }

    /// GET a resource and decode the body
    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None).await?.parse()
    }

    /// POST a new object and wait until it has been provisioned
    ///
    /// Once gridscale has assigned an object UUID, any later failure is
    /// returned as [`GridscaleError::Incomplete`] carrying that UUID.
    pub(crate) async fn create(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<CreatedObject> {
        let reply = self.send(Method::POST, path, Some(&body)).await?;
        let created: CreatedObject = reply.parse()?;

        if let Some(request_id) = created
            .request_uuid
            .as_deref()
            .or(reply.request_id.as_deref())
        {
            if let Err(source) = self.wait_for_request(request_id).await {
                tracing::warn!(
                    "Object {} was accepted but request {} did not finish",
                    created.object_uuid,
                    request_id
                );
                return Err(GridscaleError::Incomplete {
                    object_uuid: created.object_uuid.clone(),
                    source: Box::new(source),
                });
            }
        }

        Ok(created)
    }

    /// Run a call without a meaningful response body and wait for completion
    pub(crate) async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<()> {
        let reply = self.send(method, path, body.as_ref()).await?;

        if let Some(request_id) = reply.request_id.as_deref() {
            self.wait_for_request(request_id).await?;
        }

        Ok(())
    }

    /// Poll a request until gridscale reports it done or failed
    pub async fn wait_for_request(&self, request_id: &str) -> Result<()> {
        let deadline = Instant::now() + self.config.request_timeout;

        loop {
            let statuses: HashMap<String, RequestStatus> =
                self.get(&format!("/requests/{}", request_id)).await?;

            if let Some(status) = statuses.get(request_id) {
                match status.status.as_str() {
                    "done" => {
                        tracing::debug!("Request {} done", request_id);
                        return Ok(());
                    }
                    "failed" => {
                        return Err(GridscaleError::RequestFailed {
                            request_id: request_id.to_string(),
                            message: status
                                .message
                                .clone()
                                .unwrap_or_else(|| "Unknown error".to_string()),
                        });
                    }
                    other => {
                        tracing::debug!("Request {} is {}", request_id, other);
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(GridscaleError::RequestTimeout(request_id.to_string()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

struct ApiReply {
    request_id: Option<String>,
    body: String,
}

impl ApiReply {
    fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedObject {
    pub object_uuid: String,
    #[serde(default)]
    pub request_uuid: Option<String>,
    /// Only present when creating an IP address
    #[serde(default)]
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NetworksResponse {
    pub networks: HashMap<String, ApiNetwork>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiNetwork {
    pub object_uuid: String,
    pub name: String,
    #[serde(default)]
    pub public_net: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TemplateResponse {
    pub template: ApiTemplate,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiTemplate {
    pub object_uuid: String,
    pub name: String,
    #[serde(default)]
    pub location_name: String,
}
