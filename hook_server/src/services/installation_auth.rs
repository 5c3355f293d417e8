//! GitHub App installation authentication.
//!
//! An App authenticates in two steps: it signs a short-lived RS256 JWT with
//! its private key, then trades that JWT for an installation access token
//! at `POST /app/installations/{id}/access_tokens`. [`InstallationTransport`]
//! hides both steps behind `send`: every outbound request gets a valid
//! installation token attached, and the token is refreshed on demand.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::{self, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::config::AppConfig;
use crate::error::WebhookError;

pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Backdate `iat` to absorb clock drift between us and GitHub.
const JWT_BACKDATE_SECS: i64 = 60;
/// GitHub rejects App JWTs living longer than ten minutes.
const JWT_LIFETIME_SECS: i64 = 9 * 60;
/// Tokens this close to expiry are treated as expired.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Identifiers and signing key of one App installation.
#[derive(Clone)]
pub struct InstallationCredentials {
    pub app_id: u64,
    pub installation_id: u64,
    signing_key: EncodingKey,
}

impl std::fmt::Debug for InstallationCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .finish_non_exhaustive()
    }
}

impl InstallationCredentials {
    /// Validate the App settings from startup configuration and load the key.
    ///
    /// Performs no network I/O.
    pub fn from_config(config: &AppConfig) -> Result<Self, WebhookError> {
        let app_id = parse_identifier("GITHUB_APP_IDENTIFIER", config.app_id.as_deref())?;
        let installation_id = parse_identifier(
            "GITHUB_INSTALLATION_IDENTIFIER",
            config.installation_id.as_deref(),
        )?;
        let key_file = config.private_key_file.as_deref().ok_or_else(|| {
            WebhookError::Configuration("GITHUB_PRIVATE_KEY_FILE is not set".to_string())
        })?;

        Self::from_key_file(app_id, installation_id, key_file)
    }

    pub fn from_key_file(
        app_id: u64,
        installation_id: u64,
        path: &Path,
    ) -> Result<Self, WebhookError> {
        let pem = std::fs::read(path).map_err(|e| {
            WebhookError::Configuration(format!(
                "cannot read private key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_pem(app_id, installation_id, &pem)
    }

    pub fn from_pem(app_id: u64, installation_id: u64, pem: &[u8]) -> Result<Self, WebhookError> {
        let signing_key = EncodingKey::from_rsa_pem(pem).map_err(|e| {
            WebhookError::Configuration(format!("private key is not a valid RSA PEM key: {e}"))
        })?;
        Ok(Self {
            app_id,
            installation_id,
            signing_key,
        })
    }

    /// Sign the App JWT used for the token exchange.
    pub fn app_jwt(&self, now: DateTime<Utc>) -> Result<String, WebhookError> {
        #[derive(Serialize)]
        struct Claims {
            iat: i64,
            exp: i64,
            iss: String,
        }

        let claims = Claims {
            iat: (now - TimeDelta::seconds(JWT_BACKDATE_SECS)).timestamp(),
            exp: (now + TimeDelta::seconds(JWT_LIFETIME_SECS)).timestamp(),
            iss: self.app_id.to_string(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| WebhookError::Configuration(format!("cannot sign app JWT: {e}")))
    }
}

fn parse_identifier(var: &str, value: Option<&str>) -> Result<u64, WebhookError> {
    let raw = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| WebhookError::Configuration(format!("{var} is not set")))?;
    match raw.parse::<u64>() {
        Ok(0) => Err(WebhookError::Configuration(format!("{var} must be positive"))),
        Ok(id) => Ok(id),
        Err(e) => Err(WebhookError::Configuration(format!(
            "{var} is not a valid integer ({raw:?}): {e}"
        ))),
    }
}

/// A cached installation access token.
struct InstallationToken {
    token: SecretString,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Shared HTTP client carrying the headers every GitHub API call needs.
pub fn build_http_client() -> Result<reqwest::Client, WebhookError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("application/vnd.github+json"),
    );
    headers.insert(
        "x-github-api-version",
        HeaderValue::from_static(GITHUB_API_VERSION),
    );

    reqwest::Client::builder()
        .user_agent(concat!("ghapp-hook/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| WebhookError::Configuration(format!("cannot build HTTP client: {e}")))
}

/// Request decorator that authenticates as one installation.
pub struct InstallationTransport {
    credentials: InstallationCredentials,
    api_base_url: String,
    http: reqwest::Client,
    cached: Mutex<Option<InstallationToken>>,
}

impl InstallationTransport {
    pub fn new(
        credentials: InstallationCredentials,
        api_base_url: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
            cached: Mutex::new(None),
        }
    }

    pub fn credentials(&self) -> &InstallationCredentials {
        &self.credentials
    }

    /// Absolute URL for an API path such as `/repos/o/r/pulls/1`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Send `request` with a valid installation token attached.
    ///
    /// A failed refresh is returned as the error of this call.
    pub async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, WebhookError> {
        let authorization = self.authorization().await?;
        let response = request
            .header(header::AUTHORIZATION, authorization)
            .send()
            .await?;
        Ok(response)
    }

    /// `Authorization` header value for the current installation token,
    /// exchanging a new token first when needed.
    pub async fn authorization(&self) -> Result<HeaderValue, WebhookError> {
        // Held across the exchange so concurrent callers wait for one refresh.
        let mut cached = self.cached.lock().await;

        let now = Utc::now();
        let needs_refresh = cached.as_ref().map_or(true, |t| !t.is_fresh(now));
        if needs_refresh {
            *cached = Some(self.exchange(now).await?);
        }

        let token = cached
            .as_ref()
            .ok_or_else(|| WebhookError::upstream(None, "installation token unavailable"))?;
        bearer(&token.token)
    }

    async fn exchange(&self, now: DateTime<Utc>) -> Result<InstallationToken, WebhookError> {
        let jwt = SecretString::from(self.credentials.app_jwt(now)?);
        let endpoint = self.url(&format!(
            "/app/installations/{}/access_tokens",
            self.credentials.installation_id
        ));

        let response = self
            .http
            .post(&endpoint)
            .header(header::AUTHORIZATION, bearer(&jwt)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(
                installation_id = self.credentials.installation_id,
                status = status.as_u16(),
                "Installation token exchange failed"
            );
            return Err(WebhookError::upstream(
                Some(status.as_u16()),
                format!("installation token exchange failed: {message}"),
            ));
        }

        let body: AccessTokenResponse = response.json().await.map_err(|e| {
            WebhookError::upstream(
                Some(status.as_u16()),
                format!("invalid installation token response: {e}"),
            )
        })?;

        crate::metrics::installation_token_refreshed();
        tracing::debug!(
            installation_id = self.credentials.installation_id,
            expires_at = %body.expires_at,
            "Installation token refreshed"
        );

        Ok(InstallationToken {
            token: SecretString::from(body.token),
            expires_at: body.expires_at,
        })
    }
}

fn bearer(token: &SecretString) -> Result<HeaderValue, WebhookError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|e| WebhookError::upstream(None, format!("token is not a valid header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

#[cfg(test)]
pub(crate) const TEST_PRIVATE_KEY: &[u8] = include_bytes!("../../tests/fixtures/test-app-key.pem");
