//! Reconciliation passes over a claimed job.
//!
//! A pass walks the job's tasks through fixed stages. Each stage commits
//! its task updates before the next stage starts, so a pass killed at any
//! point leaves the store in a state the next pass can resume from. Issue
//! creation records the new reference only after the tracker confirmed
//! the creation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use super::{TaskListError, TaskListResult, TaskResolver};
use crate::tasklist::{
    domain::{
        ClaimToken, Destination, IssueJob, IssueJobStatus, IssueRef, ProgressReport, StateReason,
        Task, TaskStatus, parse_checklist, rewrite_checklist, stale_before,
    },
    ports::{
        IssueEdit, IssueTracker, IssueTrackerError, IssueTrackerFactory, JobStore, JobStoreError,
        TaskFilter,
    },
};

/// Feature toggles and limits applied to every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Open or close bound issues to follow their checkbox.
    pub sync_checkbox_state: bool,
    /// Create issues for items that do not reference one.
    pub create_issues: bool,
    /// Close the source issue once every item is checked.
    pub close_parent: bool,
    /// Age after which a running claim is considered abandoned.
    pub stale_after: Duration,
    /// Stage rounds per pass before the job is handed back as pending.
    pub max_rounds: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            sync_checkbox_state: true,
            create_issues: true,
            close_parent: true,
            stale_after: Duration::from_secs(24),
            max_rounds: 3,
        }
    }
}

enum StageOutcome {
    Continue,
    Inconsistent,
}

/// Runs reconciliation passes.
#[derive(Clone)]
pub struct ReconciliationService<R, F, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    C: Clock + Send + Sync,
{
    store: Arc<R>,
    trackers: Arc<F>,
    clock: Arc<C>,
    options: ReconcileOptions,
}

struct Pass<'a, R, T, C>
where
    R: JobStore,
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    store: &'a R,
    tracker: Arc<T>,
    clock: &'a C,
    options: ReconcileOptions,
    job: IssueJob,
    claim: ClaimToken,
}

impl<R, F, C> ReconciliationService<R, F, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    C: Clock + Send + Sync,
{
    /// Creates a reconciliation service.
    #[must_use]
    pub const fn new(
        store: Arc<R>,
        trackers: Arc<F>,
        clock: Arc<C>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            store,
            trackers,
            clock,
            options,
        }
    }

    /// Returns the options applied to passes.
    #[must_use]
    pub const fn options(&self) -> ReconcileOptions {
        self.options
    }

    /// Claims the job of `issue_ref`, runs one pass and returns the
    /// resulting job status.
    ///
    /// The pass only runs when it wins the claim. Otherwise the current
    /// status is returned untouched.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListError::JobNotFound`] for an unknown job. Tracker
    /// failures other than a missing issue abort the pass and leave the job
    /// running until its claim goes stale.
    pub async fn advance(&self, issue_ref: &IssueRef) -> TaskListResult<IssueJobStatus> {
        let current = self.current(issue_ref).await?;
        let now = self.clock.utc();
        let claimed = self
            .store
            .claim_job(issue_ref, now, stale_before(now, self.options.stale_after))
            .await?;
        let Some((job, claim)) = claimed.and_then(with_claim) else {
            tracing::debug!(
                issue_ref = %issue_ref,
                status = current.status().as_str(),
                "job not claimable"
            );
            return Ok(current.status());
        };
        self.run_claimed(job, claim).await
    }

    /// Runs one pass for a job a supervisor already claimed with `claim`.
    ///
    /// When the claim no longer owns the job the current status is
    /// returned and nothing is touched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::advance`].
    pub async fn resume(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
    ) -> TaskListResult<IssueJobStatus> {
        let job = self.current(issue_ref).await?;
        if !job.is_owned_by(claim) {
            tracing::debug!(
                issue_ref = %issue_ref,
                status = job.status().as_str(),
                "claim no longer owns the job"
            );
            return Ok(job.status());
        }
        self.run_claimed(job, claim).await
    }

    async fn current(&self, issue_ref: &IssueRef) -> TaskListResult<IssueJob> {
        self.store
            .find_job(issue_ref)
            .await?
            .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone()))
    }

    async fn run_claimed(
        &self,
        job: IssueJob,
        claim: ClaimToken,
    ) -> TaskListResult<IssueJobStatus> {
        let issue_ref = job.issue_ref().clone();
        tracing::info!(issue_ref = %issue_ref, claim = %claim, "pass started");
        let tracker = self.trackers.for_installation(job.installation())?;
        let mut pass = Pass {
            store: &*self.store,
            tracker,
            clock: &*self.clock,
            options: self.options,
            job,
            claim,
        };
        let status = pass.run().await?;
        tracing::info!(issue_ref = %issue_ref, status = status.as_str(), "pass finished");
        Ok(status)
    }
}

fn with_claim(job: IssueJob) -> Option<(IssueJob, ClaimToken)> {
    job.claim_token().map(|claim| (job, claim))
}

impl<R, T, C> Pass<'_, R, T, C>
where
    R: JobStore,
    T: IssueTracker,
    C: Clock + Send + Sync,
{
    async fn run(&mut self) -> TaskListResult<IssueJobStatus> {
        for round in 0..self.options.max_rounds {
            self.classify_pending().await?;
            self.sync_issue_status().await?;
            self.create_issues().await?;
            if matches!(self.rewrite_body().await?, StageOutcome::Inconsistent) {
                return self.finish(IssueJobStatus::Error).await;
            }
            if self.open_tasks().await? == 0 {
                tracing::debug!(issue_ref = %self.job.issue_ref(), round, "all tasks terminal");
                self.close_parent_if_complete().await?;
                self.report_progress().await?;
                return self.finish(IssueJobStatus::Done).await;
            }
        }
        tracing::info!(
            issue_ref = %self.job.issue_ref(),
            rounds = self.options.max_rounds,
            "tasks still open, handing job back"
        );
        self.report_progress().await?;
        self.finish(IssueJobStatus::Pending).await
    }

    async fn tasks(&self, status: TaskStatus) -> TaskListResult<Vec<Task>> {
        let filter = TaskFilter::for_job(self.job.issue_ref().clone()).with_status(status);
        Ok(self.store.find_tasks(&filter).await?)
    }

    async fn open_tasks(&self) -> TaskListResult<usize> {
        let tasks = self
            .store
            .find_tasks(&TaskFilter::for_job(self.job.issue_ref().clone()))
            .await?;
        Ok(tasks
            .iter()
            .filter(|task| !task.status().is_terminal())
            .count())
    }

    async fn classify_pending(&self) -> TaskListResult<()> {
        let resolver = TaskResolver::new(Arc::clone(&self.tracker));
        for task in self.tasks(TaskStatus::Pending).await? {
            let mut resolved = task.clone();
            let outcome = match resolver.resolve(&task, &self.job).await {
                Ok(Destination::Existing(issue_ref)) => {
                    resolved.bind_existing(issue_ref, self.clock)
                }
                Ok(Destination::Create(target)) => resolved.plan_creation(target, self.clock),
                Err(TaskListError::Domain(err)) => Err(err),
                Err(err) => return Err(err),
            };
            if let Err(err) = outcome {
                tracing::warn!(text = %task.raw_text(), error = %err, "task cannot be resolved");
                self.fail_task(task).await?;
                continue;
            }
            match self.store.update_task(&resolved).await {
                Ok(()) => {
                    tracing::debug!(
                        text = %resolved.raw_text(),
                        status = resolved.status().as_str(),
                        "task classified"
                    );
                }
                Err(JobStoreError::DuplicateResolvedIssue { resolved: issue, .. }) => {
                    tracing::warn!(
                        text = %task.raw_text(),
                        issue = %issue,
                        "issue already tracked by another task"
                    );
                    self.fail_task(task).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn sync_issue_status(&self) -> TaskListResult<()> {
        for mut task in self.tasks(TaskStatus::UpdateIssueStatus).await? {
            if self.options.sync_checkbox_state {
                let Some(issue_ref) = task.resolved_issue().cloned() else {
                    self.fail_task(task).await?;
                    continue;
                };
                match self.apply_checkbox(&issue_ref, task.checked()).await {
                    Ok(()) => {}
                    Err(err) if err.is_not_found() => {
                        tracing::warn!(issue = %issue_ref, "referenced issue not found");
                        self.fail_task(task).await?;
                        continue;
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            task.transition_to(TaskStatus::Done, self.clock)?;
            self.store.update_task(&task).await?;
        }
        Ok(())
    }

    async fn apply_checkbox(
        &self,
        issue_ref: &IssueRef,
        checked: bool,
    ) -> Result<(), IssueTrackerError> {
        let issue = self.tracker.get_issue(issue_ref).await?;
        let edit = match (checked, issue.is_open()) {
            (true, true) => IssueEdit::close(),
            (false, false) => IssueEdit::reopen(),
            _ => return Ok(()),
        };
        tracing::debug!(issue = %issue_ref, checked, "syncing issue state");
        self.tracker.edit_issue(issue_ref, &edit).await
    }

    async fn create_issues(&self) -> TaskListResult<()> {
        for mut task in self.tasks(TaskStatus::CreateIssue).await? {
            if !self.options.create_issues {
                task.transition_to(TaskStatus::Done, self.clock)?;
                self.store.update_task(&task).await?;
                continue;
            }
            let Some(target) = task.target().cloned() else {
                self.fail_task(task).await?;
                continue;
            };
            let milestone = self
                .job
                .milestone()
                .filter(|_| &target.repository == self.job.repository());
            let created = match self
                .tracker
                .create_issue(&target.repository, &target.title, milestone)
                .await
            {
                Ok(created) => created,
                Err(err) if err.is_not_found() => {
                    tracing::warn!(repository = %target.repository, "target repository not found");
                    self.fail_task(task).await?;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            tracing::info!(text = %task.raw_text(), issue = %created, "created issue");
            let mut recorded = task.clone();
            recorded.record_created(created, self.clock)?;
            match self.store.update_task(&recorded).await {
                Ok(()) => {}
                Err(JobStoreError::DuplicateResolvedIssue { resolved, .. }) => {
                    tracing::warn!(issue = %resolved, "created issue already tracked");
                    self.fail_task(task).await?;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn rewrite_body(&mut self) -> TaskListResult<StageOutcome> {
        let mut batch = self.tasks(TaskStatus::UpdateIssueBody).await?;
        if batch.is_empty() {
            return Ok(StageOutcome::Continue);
        }
        let mut replacements = HashMap::with_capacity(batch.len());
        for task in &batch {
            let Some(resolved) = task.resolved_issue() else {
                tracing::warn!(
                    issue_ref = %self.job.issue_ref(),
                    text = %task.raw_text(),
                    "created task has no issue reference"
                );
                return Ok(StageOutcome::Inconsistent);
            };
            replacements.insert(task.raw_text().to_owned(), resolved.to_string());
        }

        let source = self.tracker.get_issue(self.job.issue_ref()).await?;
        let body = rewrite_checklist(&source.body, &replacements);
        if body != source.body {
            self.tracker
                .edit_issue(self.job.issue_ref(), &IssueEdit::body(body))
                .await?;
        }

        for task in &mut batch {
            task.transition_to(TaskStatus::Done, self.clock)?;
        }
        self.store.update_tasks(&batch).await?;
        tracing::debug!(rewritten = batch.len(), "issue body rewritten");
        self.report_progress().await?;
        Ok(StageOutcome::Continue)
    }

    async fn close_parent_if_complete(&self) -> TaskListResult<()> {
        if !self.options.close_parent {
            return Ok(());
        }
        let source = self.tracker.get_issue(self.job.issue_ref()).await?;
        let items = parse_checklist(&source.body);
        if items.is_empty() || !source.is_open() || !items.iter().all(|item| item.checked) {
            return Ok(());
        }
        let edit = IssueEdit::close().with_state_reason(Some(StateReason::Completed));
        self.tracker.edit_issue(self.job.issue_ref(), &edit).await?;
        tracing::info!(issue_ref = %self.job.issue_ref(), "closed completed source issue");
        Ok(())
    }

    async fn report_progress(&mut self) -> TaskListResult<()> {
        let tasks = self
            .store
            .find_tasks(&TaskFilter::for_job(self.job.issue_ref().clone()))
            .await?;
        let done = tasks
            .iter()
            .filter(|task| task.status().is_terminal())
            .count();
        let text = ProgressReport::from_counts(done, tasks.len()).render()?;
        let known = self.job.progress_comment();
        let comment = self
            .tracker
            .upsert_comment(self.job.issue_ref(), Some(known), &text)
            .await?;
        if comment != known {
            self.store
                .set_progress_comment(self.job.issue_ref(), comment)
                .await?;
            self.job.set_progress_comment(comment);
            tracing::info!(
                issue_ref = %self.job.issue_ref(),
                previous = %known,
                comment = %comment,
                "progress comment replaced"
            );
        }
        Ok(())
    }

    async fn fail_task(&self, mut task: Task) -> TaskListResult<()> {
        task.transition_to(TaskStatus::Error, self.clock)?;
        self.store.update_task(&task).await?;
        Ok(())
    }

    async fn finish(&mut self, status: IssueJobStatus) -> TaskListResult<IssueJobStatus> {
        self.job.transition_to(status, self.clock)?;
        let issue_ref = self.job.issue_ref();
        match self.store.release_job(&self.job, self.claim).await? {
            Some(stored) => {
                if stored.status() != status {
                    tracing::info!(
                        issue_ref = %issue_ref,
                        status = stored.status().as_str(),
                        "tasks added during the pass, handing job back"
                    );
                }
                Ok(stored.status())
            }
            None => {
                let stored = self
                    .store
                    .find_job(issue_ref)
                    .await?
                    .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone()))?;
                tracing::warn!(
                    issue_ref = %issue_ref,
                    status = stored.status().as_str(),
                    "claim lost before the pass finished"
                );
                Ok(stored.status())
            }
        }
    }
}
