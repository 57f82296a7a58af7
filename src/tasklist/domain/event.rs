//! Issue events delivered by the tracker's webhooks.

use super::SourceIssue;

/// What happened to the source issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueAction {
    /// The issue was opened.
    Opened,
    /// The issue title or body was edited.
    Edited,
    /// The issue was closed.
    Closed,
    /// Any other issue action, kept for logging.
    Other(String),
}

impl IssueAction {
    /// Maps a webhook `action` field.
    #[must_use]
    pub fn from_action(action: &str) -> Self {
        match action {
            "opened" => Self::Opened,
            "edited" => Self::Edited,
            "closed" => Self::Closed,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// An action on a source issue, with the issue as it is after the action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueEvent {
    /// Action reported by the webhook.
    pub action: IssueAction,
    /// Issue snapshot and installation.
    pub source: SourceIssue,
}

impl IssueEvent {
    /// Pairs an action with its issue.
    #[must_use]
    pub const fn new(action: IssueAction, source: SourceIssue) -> Self {
        Self { action, source }
    }
}
