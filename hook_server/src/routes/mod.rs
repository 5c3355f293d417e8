//! HTTP routes — webhook receiver, liveness, metrics.

pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::SecretString;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::events::{DELIVERY_HEADER, EVENT_TYPE_HEADER};
use crate::services::github_service::GitHubClient;

/// Shared state for route handlers. Immutable after startup apart from the
/// client's token cache.
#[derive(Clone)]
pub struct AppState {
    pub webhook_secret: Arc<SecretString>,
    pub github: GitHubClient,
    pub metrics: Option<PrometheusHandle>,
    /// Bound on processing one delivery, including its GitHub API calls.
    pub webhook_timeout: Duration,
}

/// Slack the request-level timeout gives the webhook handler so that the
/// handler's own timeout fires, and is logged, first.
const REQUEST_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Build the service router.
pub fn app_router(state: AppState) -> Router {
    let request_timeout = state.webhook_timeout + REQUEST_TIMEOUT_GRACE;
    Router::new()
        .route("/webhooks", post(webhook_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Webhook ──

async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let event_type = header_or(&headers, EVENT_TYPE_HEADER, "unknown");
    let delivery = header_or(&headers, DELIVERY_HEADER, "-");

    let span = tracing::info_span!("webhook", event = %event_type, delivery = %delivery);
    webhook::handle_webhook(
        &state.webhook_secret,
        &state.github,
        &headers,
        &body,
        state.webhook_timeout,
    )
    .instrument(span)
    .await
}

fn header_or<'a>(headers: &'a HeaderMap, name: &str, default: &'a str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(default)
}

// ── Operations ──

async fn healthz() -> &'static str {
    "ok"
}

async fn metrics_handler(State(state): State<AppState>) -> Result<String, StatusCode> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or(StatusCode::NOT_FOUND)
}
