//! In-memory job store for tests and single-process runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::tasklist::{
    domain::{ClaimToken, CommentId, IssueJob, IssueJobStatus, IssueRef, Task, TaskId},
    ports::{JobStore, JobStoreError, JobStoreResult, TaskFilter},
};

/// Thread-safe in-memory job store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryJobStore {
    state: Arc<RwLock<InMemoryStoreState>>,
}

#[derive(Debug, Default)]
struct InMemoryStoreState {
    jobs: HashMap<IssueRef, IssueJob>,
    tasks: Vec<Task>,
}

impl InMemoryJobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&InMemoryStoreState) -> T) -> JobStoreResult<T> {
        let state = self
            .state
            .read()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        Ok(f(&state))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut InMemoryStoreState) -> JobStoreResult<T>,
    ) -> JobStoreResult<T> {
        let mut state = self
            .state
            .write()
            .map_err(|err| JobStoreError::persistence(std::io::Error::other(err.to_string())))?;
        f(&mut state)
    }
}

impl InMemoryStoreState {
    fn job_mut(&mut self, issue_ref: &IssueRef) -> JobStoreResult<&mut IssueJob> {
        self.jobs
            .get_mut(issue_ref)
            .ok_or_else(|| JobStoreError::JobNotFound(issue_ref.clone()))
    }

    fn has_open_tasks(&self, parent: &IssueRef) -> bool {
        self.tasks
            .iter()
            .any(|task| task.parent() == parent && !task.status().is_terminal())
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|task| task.id() == id)
    }

    fn check_new_task(&self, pending: &[Task], task: &Task) -> JobStoreResult<()> {
        if !self.jobs.contains_key(task.parent()) {
            return Err(JobStoreError::JobNotFound(task.parent().clone()));
        }
        let siblings = self
            .tasks
            .iter()
            .chain(pending)
            .filter(|other| other.parent() == task.parent());
        for other in siblings {
            if other.raw_text() == task.raw_text() {
                return Err(JobStoreError::DuplicateTask {
                    parent: task.parent().clone(),
                    raw_text: task.raw_text().to_owned(),
                });
            }
            check_resolved_conflict(other, task)?;
        }
        Ok(())
    }

    fn check_updated_task(&self, task: &Task) -> JobStoreResult<()> {
        self.tasks
            .iter()
            .filter(|other| other.parent() == task.parent() && other.id() != task.id())
            .try_for_each(|other| check_resolved_conflict(other, task))
    }
}

fn check_resolved_conflict(existing: &Task, candidate: &Task) -> JobStoreResult<()> {
    match (existing.resolved_issue(), candidate.resolved_issue()) {
        (Some(left), Some(right)) if left == right => Err(JobStoreError::DuplicateResolvedIssue {
            parent: candidate.parent().clone(),
            resolved: right.clone(),
        }),
        _ => Ok(()),
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_job(&self, issue_ref: &IssueRef) -> JobStoreResult<Option<IssueJob>> {
        self.read(|state| state.jobs.get(issue_ref).cloned())
    }

    async fn insert_job(&self, job: &IssueJob) -> JobStoreResult<()> {
        self.write(|state| {
            if state.jobs.contains_key(job.issue_ref()) {
                return Err(JobStoreError::DuplicateJob(job.issue_ref().clone()));
            }
            state.jobs.insert(job.issue_ref().clone(), job.clone());
            Ok(())
        })
    }

    async fn update_job(&self, job: &IssueJob) -> JobStoreResult<()> {
        self.write(|state| {
            *state.job_mut(job.issue_ref())? = job.clone();
            Ok(())
        })
    }

    async fn claim_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        self.write(|state| {
            Ok(state
                .jobs
                .get_mut(issue_ref)
                .filter(|job| job.is_claimable(stale_before))
                .map(|job| {
                    job.claim(now, stale_before);
                    job.clone()
                }))
        })
    }

    async fn checkpoint_job(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        self.write(|state| {
            Ok(state.jobs.get_mut(issue_ref).map(|job| {
                job.checkpoint(claim, now);
                job.clone()
            }))
        })
    }

    async fn release_job(
        &self,
        job: &IssueJob,
        claim: ClaimToken,
    ) -> JobStoreResult<Option<IssueJob>> {
        self.write(|state| {
            let open = state.has_open_tasks(job.issue_ref());
            let stored = state.job_mut(job.issue_ref())?;
            if !stored.is_owned_by(claim) {
                return Ok(None);
            }
            let mut released = job.clone();
            if released.status() == IssueJobStatus::Done && open {
                released.reopen(job.updated_at());
            }
            *stored = released.clone();
            Ok(Some(released))
        })
    }

    async fn reopen_job(
        &self,
        issue_ref: &IssueRef,
        now: DateTime<Utc>,
    ) -> JobStoreResult<Option<IssueJob>> {
        self.write(|state| {
            Ok(state.jobs.get_mut(issue_ref).map(|job| {
                job.reopen(now);
                job.clone()
            }))
        })
    }

    async fn set_progress_comment(
        &self,
        issue_ref: &IssueRef,
        comment: CommentId,
    ) -> JobStoreResult<()> {
        self.write(|state| {
            state.job_mut(issue_ref)?.set_progress_comment(comment);
            Ok(())
        })
    }

    async fn find_tasks(&self, filter: &TaskFilter) -> JobStoreResult<Vec<Task>> {
        self.read(|state| {
            state
                .tasks
                .iter()
                .filter(|task| filter.matches(task))
                .cloned()
                .collect()
        })
    }

    async fn insert_tasks(&self, tasks: &[Task]) -> JobStoreResult<()> {
        self.write(|state| {
            for (index, task) in tasks.iter().enumerate() {
                let earlier = tasks.get(..index).unwrap_or_default();
                state.check_new_task(earlier, task)?;
            }
            state.tasks.extend(tasks.iter().cloned());
            Ok(())
        })
    }

    async fn update_task(&self, task: &Task) -> JobStoreResult<()> {
        self.update_tasks(std::slice::from_ref(task)).await
    }

    async fn update_tasks(&self, tasks: &[Task]) -> JobStoreResult<()> {
        self.write(|state| {
            let mut positions = Vec::with_capacity(tasks.len());
            for task in tasks {
                let position = state
                    .position(task.id())
                    .ok_or(JobStoreError::TaskNotFound(task.id()))?;
                state.check_updated_task(task)?;
                positions.push(position);
            }
            for (position, task) in positions.into_iter().zip(tasks) {
                if let Some(stored) = state.tasks.get_mut(position) {
                    *stored = task.clone();
                }
            }
            Ok(())
        })
    }
}
