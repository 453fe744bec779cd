//! API client for the operator's status and health endpoints

use anyhow::{Context, Result};
use operator_lib::{HealthResponse, OperatorStatus};
use reqwest::Client;
use serde::de::DeserializeOwned;
use url::Url;

/// API client for a running operator
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    ///
    /// `/healthz` answers 503 with a body when a component is unhealthy, so
    /// `accept_unavailable` lets that body through.
    async fn get<T: DeserializeOwned>(&self, path: &str, accept_unavailable: bool) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let unavailable = accept_unavailable && status == reqwest::StatusCode::SERVICE_UNAVAILABLE;
        if !status.is_success() && !unavailable {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Current operator status snapshot
    pub async fn status(&self) -> Result<OperatorStatus> {
        self.get("status", false).await
    }

    /// Component health
    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("healthz", true).await
    }
}
