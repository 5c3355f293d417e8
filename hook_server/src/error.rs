//! Error taxonomy for webhook processing and GitHub API access.

use thiserror::Error;

/// Everything that can go wrong between receiving a delivery and finishing
/// the API call it triggers.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, or not matching the body.
    #[error("webhook authentication failed: {0}")]
    Authentication(String),

    /// Body is not a valid payload for the declared event type.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// The `X-GitHub-Event` header names a type that is not modeled.
    #[error("unrecognized event type: {0}")]
    UnrecognizedEventType(String),

    /// Missing or invalid startup configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// GitHub API call failed, including installation token refresh.
    #[error("GitHub API error{}: {message}", status_suffix(.status))]
    UpstreamApi {
        status: Option<u16>,
        message: String,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl WebhookError {
    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "authentication",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::UnrecognizedEventType(_) => "unrecognized_event_type",
            Self::Configuration(_) => "configuration",
            Self::UpstreamApi { .. } => "upstream_api",
        }
    }

    pub(crate) fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::UpstreamApi {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for WebhookError {
    fn from(e: reqwest::Error) -> Self {
        Self::upstream(e.status().map(|s| s.as_u16()), e.to_string())
    }
}
