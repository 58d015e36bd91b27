//! Octopus Deploy REST client

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::header::RETRY_AFTER;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ApiError;
use super::models::{Account, DeploymentProcess, Feed, Project};
use super::OctopusApi;
use crate::config::Config;

const BACKEND_NAME: &str = "octopus";
const API_KEY_HEADER: &str = "X-Octopus-ApiKey";

/// Error document returned by the server for rejected requests
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorDocument {
    #[serde(default)]
    error_message: String,
    #[serde(default)]
    errors: Vec<String>,
}

/// REST client for a single Octopus server (and optionally one space)
pub struct OctopusClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl OctopusClient {
    /// Create a client for the server at `address` authenticating with `api_key`
    pub fn new(address: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(address, api_key, Duration::from_secs(30))
    }

    fn with_timeout(
        address: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let address = address.into();
        let api_key = api_key.into();

        if address.trim().is_empty() {
            return Err(ApiError::not_configured("server address"));
        }
        if api_key.trim().is_empty() {
            return Err(ApiError::not_configured("api key"));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("octoform/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::network(e.to_string()))?;

        Ok(Self {
            base_url: format!("{}/api", address.trim_end_matches('/')),
            api_key,
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        })
    }

    /// Create a client from the `server` and `http` sections of the config
    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let mut client = Self::with_timeout(
            config.server.address.clone(),
            config.server.api_key.clone(),
            Duration::from_secs(config.http.timeout_secs),
        )?
        .with_retry_config(
            config.http.max_retries,
            Duration::from_millis(config.http.retry_base_delay_ms),
            Duration::from_millis(config.http.retry_max_delay_ms),
        );

        if let Some(space) = config.server.space_id.as_deref() {
            if !space.is_empty() {
                client = client.with_space(space);
            }
        }

        Ok(client)
    }

    /// Scope every request to a space
    pub fn with_space(mut self, space_id: &str) -> Self {
        self.base_url = format!("{}/{}", self.base_url, space_id);
        self
    }

    /// Override retry settings for idempotent requests
    pub fn with_retry_config(
        mut self,
        max_retries: usize,
        base_delay: Duration,
        max_delay: Duration,
    ) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    fn retry_strategy(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries)
    }

    /// Wait as long as a rate-limited response asks, up to the configured maximum
    fn retry_delay(&self, err: &ApiError, backoff: Option<Duration>) -> Option<Duration> {
        match (backoff, err.retry_after()) {
            (Some(_), Some(secs)) => Some(Duration::from_secs(secs).min(self.max_delay)),
            (backoff, _) => backoff,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path);
        debug!("Octopus {}: {}", method, url);

        self.client
            .request(method, url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("Accept", "application/json")
    }

    /// Send a request and map non-success statuses to `ApiError`
    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.text().await.unwrap_or_default();

        Err(error_for_status(status.as_u16(), path, &body, retry_after))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::decode(e.to_string()))
    }

    /// GET with exponential backoff on transient failures
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let op = || async {
            let response = self.send(path, self.request(Method::GET, path)).await?;
            Self::decode(response).await
        };

        op.retry(self.retry_strategy())
            .when(ApiError::is_retryable)
            .adjust(|err, dur| self.retry_delay(err, dur))
            .notify(|err, dur| {
                warn!("Retrying GET {} after {:?}: {}", path, dur, err);
            })
            .await
    }

    async fn write<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .send(path, self.request(method, path).json(body))
            .await?;
        Self::decode(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(path, self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

/// Map a failed response to the matching error variant
fn error_for_status(status: u16, path: &str, body: &str, retry_after: Option<u64>) -> ApiError {
    match status {
        401 => ApiError::Unauthorized,
        403 => ApiError::forbidden(path),
        404 => ApiError::not_found(path),
        429 => ApiError::rate_limited(retry_after),
        400 | 409 | 422 => match serde_json::from_str::<ErrorDocument>(body) {
            Ok(doc) if !doc.error_message.is_empty() => {
                ApiError::validation(status, doc.error_message, doc.errors)
            }
            _ => ApiError::validation(status, body, vec![]),
        },
        _ => ApiError::http(status, body),
    }
}

fn require_id<'a>(id: Option<&'a str>, kind: &str) -> Result<&'a str, ApiError> {
    id.filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::validation(400, format!("{} has no id", kind), vec![]))
}

#[async_trait]
impl OctopusApi for OctopusClient {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    async fn get_project(&self, project_id: &str) -> Result<Project, ApiError> {
        self.get(&format!("projects/{}", project_id)).await
    }

    async fn get_deployment_process(
        &self,
        process_id: &str,
    ) -> Result<DeploymentProcess, ApiError> {
        self.get(&format!("deploymentprocesses/{}", process_id))
            .await
    }

    async fn update_deployment_process(
        &self,
        process: &DeploymentProcess,
    ) -> Result<DeploymentProcess, ApiError> {
        let path = format!("deploymentprocesses/{}", process.id);
        self.write(Method::PUT, &path, process).await
    }

    async fn create_feed(&self, feed: &Feed) -> Result<Feed, ApiError> {
        self.write(Method::POST, "feeds", feed).await
    }

    async fn get_feed(&self, feed_id: &str) -> Result<Feed, ApiError> {
        self.get(&format!("feeds/{}", feed_id)).await
    }

    async fn update_feed(&self, feed: &Feed) -> Result<Feed, ApiError> {
        let id = require_id(feed.id.as_deref(), "feed")?;
        self.write(Method::PUT, &format!("feeds/{}", id), feed)
            .await
    }

    async fn delete_feed(&self, feed_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("feeds/{}", feed_id)).await
    }

    async fn create_account(&self, account: &Account) -> Result<Account, ApiError> {
        self.write(Method::POST, "accounts", account).await
    }

    async fn get_account(&self, account_id: &str) -> Result<Account, ApiError> {
        self.get(&format!("accounts/{}", account_id)).await
    }

    async fn update_account(&self, account: &Account) -> Result<Account, ApiError> {
        let id = require_id(account.id.as_deref(), "account")?;
        self.write(Method::PUT, &format!("accounts/{}", id), account)
            .await
    }

    async fn delete_account(&self, account_id: &str) -> Result<(), ApiError> {
        self.delete(&format!("accounts/{}", account_id)).await
    }
}
