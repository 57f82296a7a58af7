//! Service-level errors for task-list reconciliation.

use crate::tasklist::{
    domain::{IssueRef, TaskListDomainError},
    ports::{IssueTrackerError, JobStoreError, PassError},
};
use thiserror::Error;

/// Errors returned by task-list services.
#[derive(Debug, Error)]
pub enum TaskListError {
    /// Domain validation or a transition failed.
    #[error(transparent)]
    Domain(#[from] TaskListDomainError),

    /// The job store failed.
    #[error(transparent)]
    Store(#[from] JobStoreError),

    /// The issue tracker failed.
    #[error(transparent)]
    Tracker(#[from] IssueTrackerError),

    /// The worker could not be supervised.
    #[error(transparent)]
    Pass(#[from] PassError),

    /// The source issue body has no checklist.
    #[error("issue {0} has no task list")]
    NoChecklist(IssueRef),

    /// No job exists for the issue.
    #[error("no reconciliation job for {0}")]
    JobNotFound(IssueRef),
}

/// Result type for task-list services.
pub type TaskListResult<T> = Result<T, TaskListError>;
