//! Destination lookup for classified tasks.

use std::sync::Arc;

use super::TaskListResult;
use crate::tasklist::{
    domain::{Destination, IssueJob, Task},
    ports::IssueTracker,
};

/// Decides where each task points, asking the tracker whether a bare
/// single-token item names a repository.
pub struct TaskResolver<T>
where
    T: IssueTracker + ?Sized,
{
    tracker: Arc<T>,
}

impl<T> TaskResolver<T>
where
    T: IssueTracker + ?Sized,
{
    /// Creates a resolver backed by `tracker`.
    #[must_use]
    pub const fn new(tracker: Arc<T>) -> Self {
        Self { tracker }
    }

    /// Resolves `task` against the snapshot held by `job`.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskListError::Tracker`] when the repository lookup
    /// fails, or [`super::TaskListError::Domain`] when a bracketed
    /// repository cannot be qualified.
    pub async fn resolve(&self, task: &Task, job: &IssueJob) -> TaskListResult<Destination> {
        let kind = task.kind();
        let existing = match kind.repository_candidate(job.repository().owner()) {
            Some(candidate) => self.tracker.find_repository(&candidate).await?,
            None => None,
        };
        Ok(kind.destination(job, existing)?)
    }
}
