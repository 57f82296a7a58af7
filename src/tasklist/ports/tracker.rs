//! Issue-tracker port used by reconciliation passes.

use crate::tasklist::domain::{
    CommentId, InstallationContext, IssueRef, IssueState, MilestoneNumber, RepositoryFullName,
    StateReason, TrackedIssue,
};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for issue-tracker operations.
pub type IssueTrackerResult<T> = Result<T, IssueTrackerError>;

/// Fields to change on an issue. Unset fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueEdit {
    /// New open/closed state.
    pub state: Option<IssueState>,
    /// Reason recorded with the state change.
    pub state_reason: Option<StateReason>,
    /// New markdown body.
    pub body: Option<String>,
}

impl IssueEdit {
    /// Closes the issue.
    #[must_use]
    pub fn close() -> Self {
        Self {
            state: Some(IssueState::Closed),
            ..Self::default()
        }
    }

    /// Reopens the issue.
    #[must_use]
    pub fn reopen() -> Self {
        Self {
            state: Some(IssueState::Open),
            ..Self::default()
        }
    }

    /// Replaces the issue body.
    #[must_use]
    pub fn body(body: impl Into<String>) -> Self {
        Self {
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Attaches a state reason.
    #[must_use]
    pub const fn with_state_reason(mut self, reason: Option<StateReason>) -> Self {
        self.state_reason = reason;
        self
    }
}

/// Issue operations on behalf of one installation.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetches an issue.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError::NotFound`] when the issue does not
    /// exist.
    async fn get_issue(&self, issue_ref: &IssueRef) -> IssueTrackerResult<TrackedIssue>;

    /// Applies an edit to an issue.
    async fn edit_issue(&self, issue_ref: &IssueRef, edit: &IssueEdit) -> IssueTrackerResult<()>;

    /// Creates an issue and returns its reference.
    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        title: &str,
        milestone: Option<MilestoneNumber>,
    ) -> IssueTrackerResult<IssueRef>;

    /// Writes the bot comment on an issue.
    ///
    /// With a known comment the comment is edited. Without one, the bot's
    /// existing comment is edited when present, otherwise a comment is
    /// created.
    async fn upsert_comment(
        &self,
        issue_ref: &IssueRef,
        comment: Option<CommentId>,
        text: &str,
    ) -> IssueTrackerResult<CommentId>;

    /// Looks a repository up, returning its canonical name when it exists.
    async fn find_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> IssueTrackerResult<Option<RepositoryFullName>>;
}

/// Builds trackers bound to installation credentials.
pub trait IssueTrackerFactory: Send + Sync {
    /// Tracker type handed to passes.
    type Tracker: IssueTracker + 'static;

    /// Returns the tracker acting for `installation`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError`] when credentials for the installation
    /// cannot be obtained.
    fn for_installation(
        &self,
        installation: InstallationContext,
    ) -> IssueTrackerResult<Arc<Self::Tracker>>;
}

/// Errors returned by issue-tracker implementations.
#[derive(Debug, Clone, Error)]
pub enum IssueTrackerError {
    /// The issue or repository does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The tracker rejected the request.
    #[error("tracker API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message returned by the tracker.
        message: String,
    },

    /// Credentials for the installation are unavailable.
    #[error("no credentials for installation {0}")]
    Credentials(u64),

    /// Network or decoding failure.
    #[error("tracker transport error: {0}")]
    Transport(Arc<dyn std::error::Error + Send + Sync>),
}

impl IssueTrackerError {
    /// Wraps a transport error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }

    /// Returns `true` for [`IssueTrackerError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
