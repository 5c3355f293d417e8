//! GitHub webhook pipeline — authenticate, decode, dispatch.

use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use secrecy::SecretString;

use crate::error::WebhookError;
use crate::events::{self, Event, EVENT_TYPE_HEADER};
use crate::handlers::pull_request::{handle_pull_request, MergeStatus};
use crate::services::github_service::GitHubClient;
use crate::services::signature;

/// What happened to an authenticated, decoded delivery.
#[derive(Debug)]
pub enum Outcome {
    PullRequest(MergeStatus),
    /// Modeled event type without a handler; dropped.
    Ignored(&'static str),
}

/// Run one delivery through validation, decoding and its handler.
///
/// Nothing is decoded unless the signature checks out.
pub async fn process_delivery(
    secret: &SecretString,
    github: &GitHubClient,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Outcome, WebhookError> {
    let payload = signature::validate_payload(headers, body, secret)?;
    let event_type = headers
        .get(EVENT_TYPE_HEADER)
        .and_then(|v| v.to_str().ok());
    let event = events::parse_event(event_type, &payload)?;
    crate::metrics::webhook_received(event.kind());
    dispatch(github, event).await
}

async fn dispatch(github: &GitHubClient, event: Event) -> Result<Outcome, WebhookError> {
    let kind = event.kind();
    match event {
        Event::PullRequest(pr) => {
            return handle_pull_request(github, &pr)
                .await
                .map(Outcome::PullRequest);
        }
        Event::Ping(ping) => {
            tracing::info!(
                zen = %ping.zen,
                hook_id = ?ping.hook_id,
                "Received GitHub ping webhook"
            );
        }
        Event::Push(push) => {
            tracing::info!(
                repository = %push.repository.full_name,
                git_ref = %push.git_ref,
                after = push.after.as_deref(),
                pusher = push.pusher.as_ref().map(|p| p.name.as_str()),
                head_commit = push.head_commit.as_ref().map(|c| c.id.as_str()),
                "Received push event"
            );
        }
        Event::Issues(issues) => {
            tracing::info!(
                action = %issues.action,
                repository = %issues.repository.full_name,
                owner = %issues.repository.owner.login,
                repo = %issues.repository.name,
                number = issues.issue.number,
                title = %issues.issue.title,
                "Received issues event"
            );
        }
        Event::IssueComment(comment) => {
            tracing::info!(
                action = %comment.action,
                repository = %comment.repository.full_name,
                number = comment.issue.number,
                title = %comment.issue.title,
                comment_id = comment.comment.id,
                author = comment.comment.user.as_ref().map(|u| u.login.as_str()),
                "Received issue_comment event"
            );
        }
        Event::Installation(installation) => {
            tracing::info!(
                action = %installation.action,
                installation_id = installation.installation.id,
                account = installation.installation.account.as_ref().map(|a| a.login.as_str()),
                "Received installation event"
            );
        }
        Event::CheckRun(check) => {
            tracing::info!(
                action = %check.action,
                repository = %check.repository.full_name,
                name = %check.check_run.name,
                status = %check.check_run.status,
                conclusion = check.check_run.conclusion.as_deref(),
                head_sha = %check.check_run.head_sha,
                "Received check_run event"
            );
        }
    }
    Ok(Outcome::Ignored(kind))
}

/// Handle an incoming delivery and map its outcome to a response status.
///
/// Processing that outlives `timeout` is abandoned with `408`. Failures are
/// logged here; GitHub only ever sees the status code.
pub async fn handle_webhook(
    secret: &SecretString,
    github: &GitHubClient,
    headers: &HeaderMap,
    body: &[u8],
    timeout: Duration,
) -> StatusCode {
    let result =
        match tokio::time::timeout(timeout, process_delivery(secret, github, headers, body)).await {
            Ok(result) => result,
            Err(_) => {
                crate::metrics::webhook_rejected("timeout");
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Webhook processing timed out"
                );
                return StatusCode::REQUEST_TIMEOUT;
            }
        };

    match result {
        Ok(Outcome::PullRequest(status)) => {
            tracing::debug!(
                owner = %status.owner,
                repo = %status.repo,
                number = status.number,
                merged = status.merged,
                "Webhook handled"
            );
            StatusCode::OK
        }
        Ok(Outcome::Ignored(kind)) => {
            tracing::debug!("No handler for {kind} events, acknowledged");
            StatusCode::OK
        }
        Err(e) => {
            let kind = e.kind();
            match &e {
                WebhookError::Authentication(_) => {
                    crate::metrics::webhook_rejected(kind);
                    tracing::warn!(error = %e, "Webhook signature validation failed");
                    StatusCode::UNAUTHORIZED
                }
                WebhookError::MalformedPayload(_) => {
                    crate::metrics::webhook_rejected(kind);
                    tracing::warn!(error = %e, "Could not parse webhook");
                    StatusCode::BAD_REQUEST
                }
                WebhookError::UnrecognizedEventType(_) => {
                    crate::metrics::webhook_rejected(kind);
                    tracing::info!(error = %e, "Unknown event type, dropping delivery");
                    StatusCode::ACCEPTED
                }
                // Already logged by the handler; a redelivery would not help.
                WebhookError::UpstreamApi { .. } => StatusCode::OK,
                WebhookError::Configuration(_) => {
                    tracing::error!(error = %e, "Webhook handling misconfigured");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }
}
