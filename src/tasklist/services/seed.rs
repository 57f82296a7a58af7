//! Seeding of jobs and tasks from a source issue body.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use mockable::Clock;

use super::{TaskListError, TaskListResult};
use crate::tasklist::{
    domain::{
        ChecklistItem, IssueJob, IssueJobStatus, ProgressReport, SourceIssue, Task, TaskStatus,
        parse_checklist,
    },
    ports::{IssueTracker, IssueTrackerFactory, JobStore, JobStoreError, TaskFilter},
};

/// Creates or refreshes the job of a source issue from its checklist.
///
/// Seeding is idempotent: re-running it on an unchanged body stores
/// nothing and leaves the job status untouched.
#[derive(Clone)]
pub struct TaskListSeedService<R, F, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    C: Clock + Send + Sync,
{
    store: Arc<R>,
    trackers: Arc<F>,
    clock: Arc<C>,
}

#[derive(Debug, Default)]
struct SeedChanges {
    added: Vec<Task>,
    updated: Vec<Task>,
    reopened: usize,
}

impl<R, F, C> TaskListSeedService<R, F, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    C: Clock + Send + Sync,
{
    /// Creates a seed service.
    #[must_use]
    pub const fn new(store: Arc<R>, trackers: Arc<F>, clock: Arc<C>) -> Self {
        Self {
            store,
            trackers,
            clock,
        }
    }

    /// Seeds the job of `source` from its current body.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListError::NoChecklist`] when the body has no task
    /// list, and propagates store and tracker failures.
    pub async fn seed(&self, source: &SourceIssue) -> TaskListResult<IssueJob> {
        let issue_ref = source.issue_ref();
        let items = parse_checklist(&source.issue.body);
        if items.is_empty() {
            return Err(TaskListError::NoChecklist(issue_ref.clone()));
        }

        let mut job = match self.store.find_job(issue_ref).await? {
            Some(existing) => existing,
            None => self.create_job(source).await?,
        };

        let mut existing = self
            .store
            .find_tasks(&TaskFilter::for_job(issue_ref.clone()))
            .await?;
        let changes = self.diff(&job, &mut existing, &items);

        if !changes.added.is_empty() {
            self.store.insert_tasks(&changes.added).await?;
        }
        if !changes.updated.is_empty() {
            self.store.update_tasks(&changes.updated).await?;
        }

        // A pass finishing concurrently either sees the new tasks when it
        // releases the job or is re-opened here after it stored done.
        let reopens_job = !changes.added.is_empty() || changes.reopened > 0;
        if reopens_job {
            let was_done = job.status() == IssueJobStatus::Done;
            job = self
                .store
                .reopen_job(issue_ref, self.clock.utc())
                .await?
                .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone()))?;
            if was_done && job.status() == IssueJobStatus::Pending {
                tracing::info!(issue_ref = %issue_ref, "re-opened finished job");
            }
        }

        tracing::info!(
            issue_ref = %issue_ref,
            added = changes.added.len(),
            updated = changes.updated.len(),
            reopened = changes.reopened,
            status = job.status().as_str(),
            "seeded task list"
        );
        Ok(job)
    }

    async fn create_job(&self, source: &SourceIssue) -> TaskListResult<IssueJob> {
        let issue_ref = source.issue_ref();
        let tracker = self.trackers.for_installation(source.installation)?;
        let text = ProgressReport::Started.render()?;
        let comment = tracker.upsert_comment(issue_ref, None, &text).await?;
        let job = IssueJob::new(source, comment, &*self.clock);
        match self.store.insert_job(&job).await {
            Ok(()) => {
                tracing::info!(issue_ref = %issue_ref, comment = %comment, "created job");
                Ok(job)
            }
            Err(JobStoreError::DuplicateJob(_)) => self
                .store
                .find_job(issue_ref)
                .await?
                .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone())),
            Err(err) => Err(err.into()),
        }
    }

    fn diff(
        &self,
        job: &IssueJob,
        existing: &mut [Task],
        items: &[ChecklistItem],
    ) -> SeedChanges {
        let mut changes = SeedChanges::default();
        let mut seen = HashSet::new();
        let mut touched = BTreeSet::new();

        for item in items {
            if !seen.insert(item.text.as_str()) {
                continue;
            }
            match existing.iter().position(|task| task.represents(&item.text)) {
                Some(index) => {
                    if let Some(task) = existing.get_mut(index)
                        && self.observe(task, item.checked, &mut changes)
                    {
                        touched.insert(index);
                    }
                }
                None => {
                    tracing::debug!(issue_ref = %job.issue_ref(), text = %item.text, "new task");
                    changes
                        .added
                        .push(Task::new(job.issue_ref().clone(), item, &*self.clock));
                }
            }
        }

        changes.updated = touched
            .into_iter()
            .filter_map(|index| existing.get(index).cloned())
            .collect();
        changes
    }

    fn observe(&self, task: &mut Task, checked: bool, changes: &mut SeedChanges) -> bool {
        if task.checked() == checked {
            return false;
        }
        if task.status() == TaskStatus::Done && task.resolved_issue().is_some() {
            if task.reopen_for_sync(checked, &*self.clock).is_ok() {
                changes.reopened += 1;
            }
        } else {
            task.observe_checked(checked, &*self.clock);
        }
        true
    }
}
