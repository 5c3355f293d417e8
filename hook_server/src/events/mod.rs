//! Webhook event decoding.
//!
//! The `X-GitHub-Event` header selects the payload schema; `parse_event`
//! maps it to an [`Event`] variant or reports the type as unrecognized.

pub mod payloads;

use serde::de::DeserializeOwned;

use crate::error::WebhookError;
use payloads::{
    CheckRunEvent, InstallationEvent, IssueCommentEvent, IssuesEvent, PingEvent, PullRequestEvent,
    PushEvent,
};

pub const EVENT_TYPE_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// A decoded webhook delivery.
#[derive(Debug, Clone)]
pub enum Event {
    Ping(Box<PingEvent>),
    Push(Box<PushEvent>),
    PullRequest(Box<PullRequestEvent>),
    Issues(Box<IssuesEvent>),
    IssueComment(Box<IssueCommentEvent>),
    Installation(Box<InstallationEvent>),
    CheckRun(Box<CheckRunEvent>),
}

impl Event {
    /// The `X-GitHub-Event` name this variant was decoded from.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping(_) => "ping",
            Self::Push(_) => "push",
            Self::PullRequest(_) => "pull_request",
            Self::Issues(_) => "issues",
            Self::IssueComment(_) => "issue_comment",
            Self::Installation(_) => "installation",
            Self::CheckRun(_) => "check_run",
        }
    }
}

/// Decode an authenticated payload according to its declared event type.
pub fn parse_event(event_type: Option<&str>, payload: &[u8]) -> Result<Event, WebhookError> {
    let event_type = event_type
        .filter(|t| !t.is_empty())
        .ok_or_else(|| WebhookError::UnrecognizedEventType("<missing>".to_string()))?;

    let event = match event_type {
        "ping" => Event::Ping(decode(payload)?),
        "push" => Event::Push(decode(payload)?),
        "pull_request" => Event::PullRequest(decode(payload)?),
        "issues" => Event::Issues(decode(payload)?),
        "issue_comment" => Event::IssueComment(decode(payload)?),
        "installation" => Event::Installation(decode(payload)?),
        "check_run" => Event::CheckRun(decode(payload)?),
        other => return Err(WebhookError::UnrecognizedEventType(other.to_string())),
    };
    Ok(event)
}

fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<Box<T>, WebhookError> {
    serde_json::from_slice(payload).map_err(|e| WebhookError::MalformedPayload(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pull_request_fields() {
        let event = parse_event(Some("pull_request"), fixtures::PULL_REQUEST_CLOSED.as_bytes())
            .unwrap();
        let Event::PullRequest(pr) = event else {
            panic!("expected a pull_request event");
        };
        assert_eq!(pr.action, "closed");
        assert_eq!(pr.repository.full_name, "octo-org/hello-world");
        assert_eq!(pr.repository.owner.login, "octo-org");
        assert_eq!(pr.repository.name, "hello-world");
        assert_eq!(pr.pull_request.number, 42);
        assert_eq!(pr.installation.as_ref().map(|i| i.id), Some(5678));
    }

    #[test]
    fn decodes_other_modeled_types() {
        let ping = parse_event(Some("ping"), fixtures::PING.as_bytes()).unwrap();
        assert_eq!(ping.kind(), "ping");

        let push = parse_event(Some("push"), fixtures::PUSH.as_bytes()).unwrap();
        let Event::Push(push) = push else {
            panic!("expected a push event");
        };
        assert_eq!(push.git_ref, "refs/heads/main");
        assert_eq!(push.pusher.as_ref().map(|p| p.name.as_str()), Some("octocat"));
    }

    #[test]
    fn sparse_deliveries_of_logged_types_decode() {
        let issues = br#"{"action":"opened","issue":{"number":3},
            "repository":{"name":"r","full_name":"o/r","owner":{"login":"o"}}}"#;
        let Event::Issues(issues) = parse_event(Some("issues"), issues).unwrap() else {
            panic!("expected an issues event");
        };
        assert_eq!(issues.issue.number, 3);
        assert!(issues.issue.title.is_empty());

        let check_run = br#"{"action":"completed",
            "check_run":{"name":"ci","status":"completed","head_sha":"abc"},
            "repository":{"name":"r","full_name":"o/r","owner":{"login":"o"}}}"#;
        let Event::CheckRun(check_run) = parse_event(Some("check_run"), check_run).unwrap() else {
            panic!("expected a check_run event");
        };
        assert_eq!(check_run.check_run.conclusion, None);

        let installation = br#"{"action":"created","installation":{"id":5678}}"#;
        let Event::Installation(installation) =
            parse_event(Some("installation"), installation).unwrap()
        else {
            panic!("expected an installation event");
        };
        assert!(installation.installation.account.is_none());
    }

    #[test]
    fn unmodeled_type_is_unrecognized() {
        let err = parse_event(Some("fork"), b"{}").unwrap_err();
        assert!(matches!(err, WebhookError::UnrecognizedEventType(t) if t == "fork"));
    }

    #[test]
    fn missing_type_is_unrecognized() {
        assert!(matches!(
            parse_event(None, b"{}"),
            Err(WebhookError::UnrecognizedEventType(_))
        ));
        assert!(matches!(
            parse_event(Some(""), b"{}"),
            Err(WebhookError::UnrecognizedEventType(_))
        ));
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_event(Some("pull_request"), b"{not json"),
            Err(WebhookError::MalformedPayload(_))
        ));
    }

    #[test]
    fn missing_required_fields_are_malformed() {
        let payload = br#"{"action":"opened","number":1,
            "repository":{"name":"r","full_name":"o/r","owner":{"login":"o"}}}"#;
        assert!(matches!(
            parse_event(Some("pull_request"), payload),
            Err(WebhookError::MalformedPayload(msg)) if msg.contains("pull_request")
        ));
    }
}
