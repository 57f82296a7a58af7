//! Decoding of `issues` webhook payloads.

use serde::Deserialize;
use thiserror::Error;

use crate::tasklist::domain::{
    InstallationContext, IssueAction, IssueEvent, IssueRef, IssueState, MilestoneNumber,
    SourceIssue, StateReason, TaskListDomainError, TrackedIssue,
};

/// Errors raised while decoding a webhook payload.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The payload is not a valid `issues` event.
    #[error("malformed issues payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The payload names an invalid repository or issue.
    #[error(transparent)]
    Domain(#[from] TaskListDomainError),
}

#[derive(Debug, Deserialize)]
struct IssuesPayload {
    action: String,
    issue: IssuePayload,
    repository: RepositoryPayload,
    #[serde(default)]
    installation: Option<InstallationPayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
    number: u64,
    title: String,
    #[serde(default)]
    body: Option<String>,
    state: String,
    #[serde(default)]
    state_reason: Option<String>,
    #[serde(default)]
    milestone: Option<MilestonePayload>,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct InstallationPayload {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct MilestonePayload {
    number: u64,
}

/// Decodes an `issues` event body.
///
/// A missing installation maps to installation `0`, which only static
/// token providers accept.
///
/// # Errors
///
/// Returns [`WebhookError`] when the body is not an `issues` payload or
/// names an invalid issue.
pub fn parse_issue_event(body: &[u8]) -> Result<IssueEvent, WebhookError> {
    let payload: IssuesPayload = serde_json::from_slice(body)?;
    let issue_ref = IssueRef::from_parts(&payload.repository.full_name, payload.issue.number)?;
    let issue = TrackedIssue {
        issue_ref,
        title: payload.issue.title,
        body: payload.issue.body.unwrap_or_default(),
        state: if payload.issue.state == "closed" {
            IssueState::Closed
        } else {
            IssueState::Open
        },
        state_reason: payload
            .issue
            .state_reason
            .as_deref()
            .and_then(|reason| StateReason::try_from(reason).ok()),
        milestone: payload
            .issue
            .milestone
            .map(|milestone| MilestoneNumber::new(milestone.number)),
    };
    let installation =
        InstallationContext::new(payload.installation.map_or(0, |installation| installation.id));
    Ok(IssueEvent::new(
        IssueAction::from_action(&payload.action),
        SourceIssue::new(issue, installation),
    ))
}
