//! Task record for one checklist line.

use super::{
    ChecklistItem, CreationTarget, IssueRef, ParseStatusError, TaskId, TaskKind,
    TaskListDomainError,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Seeded, not yet classified.
    Pending,
    /// Bound to an existing issue whose state follows the checkbox.
    UpdateIssueStatus,
    /// Waiting for its issue to be created.
    CreateIssue,
    /// Issue created; the checklist line still shows the original text.
    UpdateIssueBody,
    /// Reconciled.
    Done,
    /// Referenced issue could not be found.
    Error,
}

impl TaskStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UpdateIssueStatus => "update_issue_status",
            Self::CreateIssue => "create_issue",
            Self::UpdateIssueBody => "update_issue_body",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Returns `true` when `self -> target` is a forward edge.
    ///
    /// `CreateIssue -> Done` covers passes where issue creation is turned
    /// off.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Pending, Self::UpdateIssueStatus | Self::CreateIssue)
            | (Self::CreateIssue, Self::UpdateIssueBody)
            | (Self::UpdateIssueStatus | Self::CreateIssue | Self::UpdateIssueBody, Self::Done) => {
                true
            }
            (from, Self::Error) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Returns `true` for `Done` and `Error`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, ParseStatusError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "update_issue_status" => Ok(Self::UpdateIssueStatus),
            "create_issue" => Ok(Self::CreateIssue),
            "update_issue_body" => Ok(Self::UpdateIssueBody),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

/// Reconciliation record for one checklist line of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    id: TaskId,
    parent: IssueRef,
    raw_text: String,
    checked: bool,
    status: TaskStatus,
    kind: TaskKind,
    resolved_issue: Option<IssueRef>,
    target: Option<CreationTarget>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Source issue of the owning job.
    pub parent: IssueRef,
    /// Checklist text observed at seeding.
    pub raw_text: String,
    /// Last observed checkbox state.
    pub checked: bool,
    /// Persisted status.
    pub status: TaskStatus,
    /// Classification decided at seeding.
    pub kind: TaskKind,
    /// Issue the task is bound to, if any.
    pub resolved_issue: Option<IssueRef>,
    /// Creation destination, if any.
    pub target: Option<CreationTarget>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Seeds a pending task from a checklist item of `parent`.
    #[must_use]
    pub fn new(parent: IssueRef, item: &ChecklistItem, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            parent,
            raw_text: item.text.clone(),
            checked: item.checked,
            status: TaskStatus::Pending,
            kind: TaskKind::classify(&item.text),
            resolved_issue: None,
            target: None,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            parent: data.parent,
            raw_text: data.raw_text,
            checked: data.checked,
            status: data.status,
            kind: data.kind,
            resolved_issue: data.resolved_issue,
            target: data.target,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the source issue of the owning job.
    #[must_use]
    pub const fn parent(&self) -> &IssueRef {
        &self.parent
    }

    /// Returns the checklist text observed at seeding.
    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Returns the last observed checkbox state.
    #[must_use]
    pub const fn checked(&self) -> bool {
        self.checked
    }

    /// Returns the task status.
    #[must_use]
    pub const fn status(&self) -> TaskStatus {
        self.status
    }

    /// Returns the seeded classification.
    #[must_use]
    pub const fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Returns the bound issue, if any.
    #[must_use]
    pub const fn resolved_issue(&self) -> Option<&IssueRef> {
        self.resolved_issue.as_ref()
    }

    /// Returns the creation destination, if any.
    #[must_use]
    pub const fn target(&self) -> Option<&CreationTarget> {
        self.target.as_ref()
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

    /// Returns `true` when `text` is this task's checklist text or its bound
    /// issue reference.
    #[must_use]
    pub fn represents(&self, text: &str) -> bool {
        self.raw_text == text
            || self
                .resolved_issue
                .as_ref()
                .is_some_and(|issue| issue.to_string() == text)
    }

    /// Binds the task to an existing issue.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidTaskTransition`] unless the task
    /// is pending.
    pub fn bind_existing(
        &mut self,
        issue_ref: IssueRef,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        self.transition_to(TaskStatus::UpdateIssueStatus, clock)?;
        self.resolved_issue = Some(issue_ref);
        Ok(())
    }

    /// Records where the task's issue must be created.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidTaskTransition`] unless the task
    /// is pending.
    pub fn plan_creation(
        &mut self,
        target: CreationTarget,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        self.transition_to(TaskStatus::CreateIssue, clock)?;
        self.target = Some(target);
        Ok(())
    }

    /// Records the issue created for the task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidTaskTransition`] unless the task
    /// is waiting for creation.
    pub fn record_created(
        &mut self,
        issue_ref: IssueRef,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        self.transition_to(TaskStatus::UpdateIssueBody, clock)?;
        self.resolved_issue = Some(issue_ref);
        Ok(())
    }

    /// Stores a newly observed checkbox state.
    pub fn observe_checked(&mut self, checked: bool, clock: &impl Clock) {
        if self.checked != checked {
            self.checked = checked;
            self.updated_at = clock.utc();
        }
    }

    /// Re-opens a finished task bound to an issue so the next pass syncs the
    /// new checkbox state.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidTaskTransition`] unless the task
    /// is done and bound to an issue.
    pub fn reopen_for_sync(
        &mut self,
        checked: bool,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        if self.status != TaskStatus::Done || self.resolved_issue.is_none() {
            return Err(self.invalid_transition(TaskStatus::UpdateIssueStatus));
        }
        self.checked = checked;
        self.status = TaskStatus::UpdateIssueStatus;
        self.updated_at = clock.utc();
        Ok(())
    }

    /// Moves the task along a forward edge.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListDomainError::InvalidTaskTransition`] when the edge
    /// is not allowed.
    pub fn transition_to(
        &mut self,
        target: TaskStatus,
        clock: &impl Clock,
    ) -> Result<(), TaskListDomainError> {
        if !self.status.can_transition_to(target) {
            return Err(self.invalid_transition(target));
        }
        self.status = target;
        self.updated_at = clock.utc();
        Ok(())
    }

    fn invalid_transition(&self, target: TaskStatus) -> TaskListDomainError {
        TaskListDomainError::InvalidTaskTransition {
            raw_text: self.raw_text.clone(),
            from: self.status.as_str(),
            to: target.as_str(),
        }
    }
}
