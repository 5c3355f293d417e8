//! `pull_request` events — look up whether the pull request is merged.

use crate::error::WebhookError;
use crate::events::payloads::PullRequestEvent;
use crate::services::github_service::GitHubClient;

/// Result of one merge-status lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeStatus {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub merged: bool,
}

/// Issue exactly one API call for the referenced pull request and log the
/// outcome. Errors are logged here and returned; nothing is retried.
pub async fn handle_pull_request(
    client: &GitHubClient,
    event: &PullRequestEvent,
) -> Result<MergeStatus, WebhookError> {
    tracing::info!(
        action = %event.action,
        repository = %event.repository.full_name,
        sender = event.sender.as_ref().map(|s| s.login.as_str()),
        "Received pull_request event"
    );

    let owner = event.repository.owner.login.as_str();
    let repo = event.repository.name.as_str();
    let number = event.pull_request.number;

    if let Some(installation) = &event.installation {
        if installation.id != client.installation_id() {
            tracing::warn!(
                event_installation = installation.id,
                configured_installation = client.installation_id(),
                "Event comes from a different installation than the configured one"
            );
        }
    }

    tracing::info!(owner, repo, number, "Checking merge status");

    match client.pull_request(owner, repo, number).await {
        Ok(pr) => {
            tracing::info!(
                owner,
                repo,
                number,
                merged = pr.merged,
                state = %pr.state,
                merged_at = ?pr.merged_at,
                "Merge status"
            );
            Ok(MergeStatus {
                owner: owner.to_string(),
                repo: repo.to_string(),
                number: pr.number,
                merged: pr.merged,
            })
        }
        Err(e) => {
            tracing::error!(owner, repo, number, error = %e, "Failed to get merge status");
            Err(e)
        }
    }
}
