//! Persistence port for reconciliation jobs and their tasks.

use crate::tasklist::domain::{ClaimToken, CommentId, IssueJob, IssueRef, Task, TaskId, TaskStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for job store operations.
pub type JobStoreResult<T> = Result<T, JobStoreError>;

/// Criteria for selecting the tasks of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    /// Source issue of the owning job.
    pub parent: IssueRef,
    /// Restricts results to one status when set.
    pub status: Option<TaskStatus>,
}

impl TaskFilter {
    /// Selects every task of `parent`.
    #[must_use]
    pub const fn for_job(parent: IssueRef) -> Self {
        Self {
            parent,
            status: None,
        }
    }

    /// Restricts the filter to one status.
    #[must_use]
    pub const fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns `true` when `task` satisfies the filter.
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        task.parent() == &self.parent && self.status.is_none_or(|status| task.status() == status)
    }
}

/// Job and task persistence contract.
///
/// Task queries return records in insertion order. Every write is atomic
/// per call.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Finds the job of a source issue.
    async fn find_job(&self, issue_ref: &IssueRef) -> JobStoreResult<Option<IssueJob>>;

    /// Stores a new job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::DuplicateJob`] when the issue already has a
    /// job.
    async fn insert_job(&self, job: &IssueJob) -> JobStoreResult<()>;

    /// Persists changes to an existing job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the job does not exist.
    async fn update_job(&self, job: &IssueJob) -> JobStoreResult<()>;

    /// Atomically moves a claimable job to running.
    ///
    /// A job is claimable when pending, or running with a claim not newer
    /// than `stale_before`. Returns the claimed job, or `None` when another
    /// pass owns it, it is finished, or it does not exist.
    async fn claim_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>>;

    /// Hands a running job back to pending when `claim` still owns it.
    ///
    /// Returns the job as stored afterwards, or `None` when it does not
    /// exist. A job owned by another claim, or not running, is returned
    /// unchanged.
    async fn checkpoint_job(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>>;

    /// Writes the final state of a pass when `claim` still owns the job.
    ///
    /// A job released as done while the store holds non-terminal tasks for
    /// it is stored as pending instead. Returns the job as stored, or
    /// `None` when the claim was lost and nothing was written.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the job does not exist.
    async fn release_job(
        &self,
        job: &IssueJob,
        claim: ClaimToken,
    ) -> JobStoreResult<Option<IssueJob>>;

    /// Moves a done job back to pending because work was added.
    ///
    /// Returns the job as stored afterwards, or `None` when it does not
    /// exist. Jobs in any other status are returned unchanged.
    async fn reopen_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>>;

    /// Records the bot progress comment of a job.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::JobNotFound`] when the job does not exist.
    async fn set_progress_comment(
        &self,
        issue_ref: &IssueRef,
        comment: CommentId,
    ) -> JobStoreResult<()>;

    /// Returns the tasks matching `filter`, in insertion order.
    async fn find_tasks(&self, filter: &TaskFilter) -> JobStoreResult<Vec<Task>>;

    /// Stores new tasks. Either every task is stored or none is.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::DuplicateTask`] when a task text is already
    /// present for the job, [`JobStoreError::DuplicateResolvedIssue`] when a
    /// bound issue is already present, or [`JobStoreError::JobNotFound`]
    /// when the parent job does not exist.
    async fn insert_tasks(&self, tasks: &[Task]) -> JobStoreResult<()>;

    /// Persists changes to one task.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::TaskNotFound`] when the task does not exist.
    async fn update_task(&self, task: &Task) -> JobStoreResult<()>;

    /// Persists changes to several tasks. Either every update is applied or
    /// none is.
    ///
    /// # Errors
    ///
    /// Returns [`JobStoreError::TaskNotFound`] when any task does not exist.
    async fn update_tasks(&self, tasks: &[Task]) -> JobStoreResult<()>;
}

/// Errors returned by job store implementations.
#[derive(Debug, Clone, Error)]
pub enum JobStoreError {
    /// A job already exists for the issue.
    #[error("duplicate job for issue: {0}")]
    DuplicateJob(IssueRef),

    /// A task with the same text already exists for the job.
    #[error("duplicate task '{raw_text}' for issue {parent}")]
    DuplicateTask {
        /// Source issue of the job.
        parent: IssueRef,
        /// Duplicated checklist text.
        raw_text: String,
    },

    /// A task bound to the same issue already exists for the job.
    #[error("issue {resolved} is already bound to a task of {parent}")]
    DuplicateResolvedIssue {
        /// Source issue of the job.
        parent: IssueRef,
        /// Issue bound twice.
        resolved: IssueRef,
    },

    /// The job was not found.
    #[error("job not found: {0}")]
    JobNotFound(IssueRef),

    /// The task was not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl JobStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
