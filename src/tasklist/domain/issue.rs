//! Issue references and issue snapshots exchanged with the tracker.

use super::{
    InstallationContext, IssueNumber, MilestoneNumber, ParseStatusError, RepositoryFullName,
    TaskListDomainError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical `owner/repo#number` reference to one issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IssueRef {
    repository: RepositoryFullName,
    number: IssueNumber,
}

impl IssueRef {
    /// Creates an issue reference from validated parts.
    #[must_use]
    pub const fn new(repository: RepositoryFullName, number: IssueNumber) -> Self {
        Self { repository, number }
    }

    /// Creates an issue reference from raw values.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError`] when the repository or number fails
    /// validation.
    pub fn from_parts(repository: &str, number: u64) -> Result<Self, TaskListDomainError> {
        Ok(Self::new(
            RepositoryFullName::new(repository)?,
            IssueNumber::new(number)?,
        ))
    }

    /// Returns the repository the issue lives in.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryFullName {
        &self.repository
    }

    /// Returns the issue number.
    #[must_use]
    pub const fn number(&self) -> IssueNumber {
        self.number
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

impl FromStr for IssueRef {
    type Err = TaskListDomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || TaskListDomainError::InvalidIssueRef(value.to_owned());
        let (repository, number) = value.trim().rsplit_once('#').ok_or_else(invalid)?;
        let parsed_number = number.parse::<u64>().map_err(|_| invalid())?;
        let repo = RepositoryFullName::new(repository).map_err(|_| invalid())?;
        let issue_number = IssueNumber::new(parsed_number).map_err(|_| invalid())?;
        Ok(Self::new(repo, issue_number))
    }
}

impl TryFrom<String> for IssueRef {
    type Error = TaskListDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IssueRef> for String {
    fn from(value: IssueRef) -> Self {
        value.to_string()
    }
}

/// Open/closed state of a tracked issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// The issue is open.
    Open,
    /// The issue is closed.
    Closed,
}

impl IssueState {
    /// Returns the tracker representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Reason recorded by the tracker when an issue changes state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateReason {
    /// Closed because the work was completed.
    Completed,
    /// Closed without completing the work.
    NotPlanned,
    /// Reopened after being closed.
    Reopened,
}

impl StateReason {
    /// Returns the tracker representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotPlanned => "not_planned",
            Self::Reopened => "reopened",
        }
    }
}

impl TryFrom<&str> for StateReason {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "not_planned" => Ok(Self::NotPlanned),
            "reopened" => Ok(Self::Reopened),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

/// Snapshot of an issue as reported by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedIssue {
    /// Canonical issue reference.
    pub issue_ref: IssueRef,
    /// Issue title.
    pub title: String,
    /// Markdown body, empty when the issue has none.
    pub body: String,
    /// Current open/closed state.
    pub state: IssueState,
    /// Reason attached to the latest state change, if any.
    pub state_reason: Option<StateReason>,
    /// Milestone the issue belongs to, if any.
    pub milestone: Option<MilestoneNumber>,
}

impl TrackedIssue {
    /// Creates an open issue snapshot without a milestone.
    #[must_use]
    pub fn open(issue_ref: IssueRef, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            issue_ref,
            title: title.into(),
            body: body.into(),
            state: IssueState::Open,
            state_reason: None,
            milestone: None,
        }
    }

    /// Returns `true` when the issue is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state == IssueState::Open
    }
}

/// Source issue delivered by an issue event, with the installation acting
/// on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceIssue {
    /// Snapshot of the issue carried by the event.
    pub issue: TrackedIssue,
    /// Installation whose credentials act on the issue.
    pub installation: InstallationContext,
}

impl SourceIssue {
    /// Pairs an issue snapshot with its installation.
    #[must_use]
    pub const fn new(issue: TrackedIssue, installation: InstallationContext) -> Self {
        Self {
            issue,
            installation,
        }
    }

    /// Returns the source issue reference.
    #[must_use]
    pub const fn issue_ref(&self) -> &IssueRef {
        &self.issue.issue_ref
    }
}
