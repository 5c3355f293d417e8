//! GitHub App webhook receiver.
//!
//! Accepts GitHub deliveries on `POST /webhooks`, verifies their HMAC
//! signature against the App's webhook secret, decodes the event, and for
//! pull request events asks the GitHub API, as the configured installation,
//! whether the pull request has been merged.

mod config;
mod error;
mod events;
mod handlers;
mod metrics;
mod routes;
mod services;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use crate::config::AppConfig;
use crate::services::github_service::GitHubClient;

#[derive(Parser)]
#[command(name = "ghapp-hook", about = "GitHub App webhook receiver", version)]
struct Cli {
    /// Server port
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    #[command(flatten)]
    config: AppConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();

    tracing::info!("Starting GitHub App webhook receiver...");

    // Configuration problems abort startup rather than every request.
    let webhook_secret = cli.config.webhook_secret()?;
    let github = GitHubClient::from_config(&cli.config)?;
    tracing::info!(
        installation_id = github.installation_id(),
        api = %cli.config.github_api_url,
        "GitHub App credentials loaded"
    );

    let metrics = match metrics::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    };

    let state = routes::AppState {
        webhook_secret: Arc::new(webhook_secret),
        github,
        metrics,
        webhook_timeout: cli.config.webhook_timeout(),
    };
    let app = routes::app_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Listening on http://{}/webhooks", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
