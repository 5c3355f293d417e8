//! Prometheus metrics for webhook processing.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder. The returned handle renders the
/// scrape output served on `/metrics`.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Record an authenticated, decoded delivery, labeled by its event kind.
pub fn webhook_received(event: &'static str) {
    counter!("webhooks_received_total", "event" => event).increment(1);
}

/// Record a delivery that was rejected or dropped before handling.
pub fn webhook_rejected(reason: &'static str) {
    counter!("webhook_rejections_total", "reason" => reason).increment(1);
}

/// Record a successful installation token exchange.
pub fn installation_token_refreshed() {
    counter!("installation_token_refreshes_total").increment(1);
}

/// Record a GitHub API call made with an installation token.
pub fn github_api_request(outcome: &'static str) {
    counter!("github_api_requests_total", "outcome" => outcome).increment(1);
}
