//! Reconciliation job for one source issue.

use super::{
    CommentId, InstallationContext, IssueRef, MilestoneNumber, ParseStatusError,
    RepositoryFullName, SourceIssue, TaskListDomainError,
};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Lifecycle status of an [`IssueJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueJobStatus {
    /// Waiting for a pass to claim the job.
    Pending,
    /// A pass currently owns the job.
    Running,
    /// An unrecoverable inconsistency stopped the job.
    Error,
    /// Every task reached a terminal status.
    Done,
}

impl IssueJobStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Error => "error",
            Self::Done => "done",
        }
    }

    /// Returns `true` when `self -> target` is an allowed job edge.
    ///
    /// `Done -> Pending` is the re-open after an edit adds work.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Pending | Self::Done | Self::Error)
                | (Self::Done, Self::Pending)
        )
    }

    /// Returns `true` when no pass will touch the job without a new event.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl TryFrom<&str> for IssueJobStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, ParseStatusError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            "done" => Ok(Self::Done),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

/// Proof that a pass owns a running job.
///
/// The token is the claim timestamp exactly as the store recorded it, so
/// it survives a round trip through storage and the worker command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimToken(DateTime<Utc>);

impl ClaimToken {
    /// Wraps a stored claim timestamp.
    #[must_use]
    pub const fn new(claimed_at: DateTime<Utc>) -> Self {
        Self(claimed_at)
    }

    /// Returns the claim timestamp.
    #[must_use]
    pub const fn claimed_at(self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for ClaimToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl FromStr for ClaimToken {
    type Err = chrono::ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DateTime::parse_from_rfc3339(value.trim()).map(|parsed| Self(parsed.with_timezone(&Utc)))
    }
}

/// Returns the newest claim timestamp that counts as abandoned at `now`.
#[must_use]
pub fn stale_before(now: DateTime<Utc>, stale_after: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(stale_after)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Reconciliation record for one source issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueJob {
    issue_ref: IssueRef,
    title: String,
    milestone: Option<MilestoneNumber>,
    status: IssueJobStatus,
    progress_comment: CommentId,
    installation: InstallationContext,
    running_since: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedIssueJobData {
    /// Source issue reference.
    pub issue_ref: IssueRef,
    /// Source issue title at creation time.
    pub title: String,
    /// Source issue milestone at creation time.
    pub milestone: Option<MilestoneNumber>,
    /// Persisted status.
    pub status: IssueJobStatus,
    /// Bot progress comment on the source issue.
    pub progress_comment: CommentId,
    /// Installation acting on the job.
    pub installation: InstallationContext,
    /// Claim timestamp of the running pass, if any.
    pub running_since: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl IssueJob {
    /// Creates a pending job from the source issue snapshot.
    #[must_use]
    pub fn new(source: &SourceIssue, progress_comment: CommentId, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            issue_ref: source.issue_ref().clone(),
            title: source.issue.title.clone(),
            milestone: source.issue.milestone,
            status: IssueJobStatus::Pending,
            progress_comment,
            installation: source.installation,
            running_since: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a job from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedIssueJobData) -> Self {
        Self {
            issue_ref: data.issue_ref,
            title: data.title,
            milestone: data.milestone,
            status: data.status,
            progress_comment: data.progress_comment,
            installation: data.installation,
            running_since: data.running_since,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the source issue reference.
    #[must_use]
    pub const fn issue_ref(&self) -> &IssueRef {
        &self.issue_ref
    }

    /// Returns the source repository.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        self.issue_ref.repository()
    }

    /// Returns the source issue title captured at creation.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the source issue milestone captured at creation.
    #[must_use]
    pub const fn milestone(&self) -> Option<MilestoneNumber> {
        self.milestone
    }

    /// Returns the job status.
    #[must_use]
    pub const fn status(&self) -> IssueJobStatus {
        self.status
    }

    /// Returns the bot progress comment identifier.
    #[must_use]
    pub const fn progress_comment(&self) -> CommentId {
        self.progress_comment
    }

    /// Returns the installation acting on the job.
    #[must_use]
    pub const fn installation(&self) -> InstallationContext {
        self.installation
    }

    /// Returns the claim timestamp of the running pass.
    #[must_use]
    pub const fn running_since(&self) -> Option<DateTime<Utc>> {
        self.running_since
    }

    /// Returns the claim of the pass owning the job, if it is running.
    #[must_use]
    pub fn claim_token(&self) -> Option<ClaimToken> {
        self.running_since
            .filter(|_| self.status == IssueJobStatus::Running)
            .map(ClaimToken)
    }

    /// Returns `true` when the pass holding `claim` still owns the job.
    #[must_use]
    pub fn is_owned_by(&self, claim: ClaimToken) -> bool {
        self.claim_token() == Some(claim)
    }

    /// Records a replacement progress comment.
    pub const fn set_progress_comment(&mut self, comment: CommentId) {
        self.progress_comment = comment;
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest update timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Moves the job along an allowed edge.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidJobTransition`] when the edge is
    /// not allowed.
    pub fn transition_to(
        &mut self,
        target: IssueJobStatus,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(TaskListDomainError::InvalidJobTransition {
                issue_ref: self.issue_ref.to_string(),
                from: self.status.as_str(),
                to: target.as_str(),
            });
        }
        self.apply_status(target, clock.utc());
        Ok(())
    }

    /// Returns `true` when a pass may claim the job.
    ///
    /// Pending jobs are always claimable. A running job is claimable once
    /// its claim is not newer than `stale_before`.
    #[must_use]
    pub fn is_claimable(&self, stale_before: DateTime<Utc>) -> bool {
        match self.status {
            IssueJobStatus::Pending => true,
            IssueJobStatus::Running => self.running_since.is_none_or(|since| since <= stale_before),
            IssueJobStatus::Error | IssueJobStatus::Done => false,
        }
    }

    /// Marks the job as owned by a pass started at `now`.
    ///
    /// Returns `false` and leaves the job unchanged when it is not
    /// claimable.
    pub fn claim(&mut self, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> bool {
        if !self.is_claimable(stale_before) {
            return false;
        }
        self.apply_status(IssueJobStatus::Running, now);
        true
    }

    /// Hands a running job owned by `claim` back to pending.
    ///
    /// Returns `false` and leaves the job unchanged when another pass owns
    /// it or it is not running.
    pub fn checkpoint(&mut self, claim: ClaimToken, now: DateTime<Utc>) -> bool {
        if !self.is_owned_by(claim) {
            return false;
        }
        self.apply_status(IssueJobStatus::Pending, now);
        true
    }

    /// Moves a finished job back to pending because work was added.
    ///
    /// Returns `false` when the job was not done.
    pub fn reopen(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != IssueJobStatus::Done {
            return false;
        }
        self.apply_status(IssueJobStatus::Pending, now);
        true
    }

    fn apply_status(&mut self, target: IssueJobStatus, now: DateTime<Utc>) {
        self.status = target;
        self.running_since = (target == IssueJobStatus::Running).then_some(now);
        self.updated_at = now;
    }
}
