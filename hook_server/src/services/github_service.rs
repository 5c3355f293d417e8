//! GitHub REST API client bound to one App installation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::WebhookError;
use crate::services::installation_auth::{
    build_http_client, InstallationCredentials, InstallationTransport,
};

/// Authenticated client; cheap to clone, all clones share one token cache.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<InstallationTransport>,
}

/// The parts of `GET /repos/{owner}/{repo}/pulls/{number}` we read.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestDetails {
    pub number: u64,
    pub state: String,
    pub merged: bool,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GitHubClient {
    pub fn new(transport: InstallationTransport) -> Self {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Build the client from startup configuration. No network calls are
    /// made until the first API request.
    pub fn from_config(config: &AppConfig) -> Result<Self, WebhookError> {
        let credentials = InstallationCredentials::from_config(config)?;
        let http = build_http_client()?;
        Ok(Self::new(InstallationTransport::new(
            credentials,
            config.github_api_url.as_str(),
            http,
        )))
    }

    pub fn installation_id(&self) -> u64 {
        self.transport.credentials().installation_id
    }

    /// Fetch a pull request; its `merged` field is the merge status.
    pub async fn pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
    ) -> Result<PullRequestDetails, WebhookError> {
        let url = self
            .transport
            .url(&format!("/repos/{owner}/{repo}/pulls/{number}"));
        let request = self.transport.http().get(url);

        let response = match self.transport.send(request).await {
            Ok(r) => r,
            Err(e) => {
                crate::metrics::github_api_request("error");
                return Err(e);
            }
        };

        let status = response.status();
        if !status.is_success() {
            crate::metrics::github_api_request("error");
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or(text);
            return Err(WebhookError::upstream(Some(status.as_u16()), message));
        }

        crate::metrics::github_api_request("ok");
        response.json::<PullRequestDetails>().await.map_err(|e| {
            WebhookError::upstream(
                Some(status.as_u16()),
                format!("invalid pull request response: {e}"),
            )
        })
    }
}
