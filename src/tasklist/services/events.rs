//! Entry point for issue events and continuation requests.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use super::{ContinuationController, TaskListResult, TaskListSeedService};
use crate::tasklist::{
    domain::{
        IssueAction, IssueEvent, IssueJobStatus, IssueRef, SourceIssue, TaskKind, has_checklist,
        parse_checklist,
    },
    ports::{
        ContinuationTrigger, IssueEdit, IssueTracker, IssueTrackerFactory, JobStore, PassLauncher,
    },
};

/// Toggles for event handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOptions {
    /// Master switch; when off every event is ignored.
    pub enabled: bool,
    /// Seed and reconcile task lists on opened and edited issues.
    pub handle_tasklist: bool,
    /// Close referenced issues when the source issue closes.
    pub close_subtasks: bool,
    /// Time a request may spend waiting for a pass.
    pub budget: Duration,
}

impl Default for EventOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            handle_tasklist: true,
            close_subtasks: true,
            budget: Duration::from_secs(8),
        }
    }
}

/// What handling an event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// The event did not concern the task list.
    Ignored,
    /// The job was seeded and, unless a live pass owned it, reconciled.
    Reconciled(IssueJobStatus),
    /// The source issue closed and this many referenced issues were closed.
    SubTasksClosed(usize),
}

/// Dispatches issue events to seeding, bounded passes and the sub-task
/// sweep.
pub struct IssueEventHandler<R, F, L, T, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    L: PassLauncher,
    T: ContinuationTrigger + ?Sized,
    C: Clock + Send + Sync,
{
    seeder: TaskListSeedService<R, F, C>,
    controller: ContinuationController<R, L, T, C>,
    trackers: Arc<F>,
    options: EventOptions,
}

impl<R, F, L, T, C> IssueEventHandler<R, F, L, T, C>
where
    R: JobStore,
    F: IssueTrackerFactory,
    L: PassLauncher,
    T: ContinuationTrigger + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a handler.
    #[must_use]
    pub const fn new(
        seeder: TaskListSeedService<R, F, C>,
        controller: ContinuationController<R, L, T, C>,
        trackers: Arc<F>,
        options: EventOptions,
    ) -> Self {
        Self {
            seeder,
            controller,
            trackers,
            options,
        }
    }

    /// Handles one issue event.
    ///
    /// # Errors
    ///
    /// Propagates seeding, worker and tracker failures.
    pub async fn handle(&self, event: &IssueEvent) -> TaskListResult<EventOutcome> {
        let issue_ref = event.source.issue_ref();
        if !self.options.enabled || !has_checklist(&event.source.issue.body) {
            tracing::debug!(issue_ref = %issue_ref, "event ignored");
            return Ok(EventOutcome::Ignored);
        }
        match event.action {
            IssueAction::Opened | IssueAction::Edited if self.options.handle_tasklist => {
                // The controller's claim decides whether a running job is
                // still owned or abandoned.
                self.seeder.seed(&event.source).await?;
                let status = self
                    .controller
                    .run_bounded(issue_ref, self.options.budget)
                    .await?;
                Ok(EventOutcome::Reconciled(status))
            }
            IssueAction::Closed if self.options.close_subtasks => {
                let closed = self.close_sub_tasks(&event.source).await?;
                Ok(EventOutcome::SubTasksClosed(closed))
            }
            _ => Ok(EventOutcome::Ignored),
        }
    }

    /// Runs a bounded pass for an existing job.
    ///
    /// # Errors
    ///
    /// Returns [`super::TaskListError::JobNotFound`] for an unknown job.
    pub async fn continue_job(&self, issue_ref: &IssueRef) -> TaskListResult<IssueJobStatus> {
        self.controller
            .run_bounded(issue_ref, self.options.budget)
            .await
    }

    /// Closes every open issue referenced by the checklist of a closed
    /// source issue, with the source issue's state reason.
    ///
    /// Missing issues are skipped.
    async fn close_sub_tasks(&self, source: &SourceIssue) -> TaskListResult<usize> {
        let tracker = self.trackers.for_installation(source.installation)?;
        let repository = source.issue_ref().repository();
        let referenced: BTreeSet<IssueRef> = parse_checklist(&source.issue.body)
            .iter()
            .filter_map(|item| match TaskKind::classify(&item.text) {
                TaskKind::IssueRef {
                    repository: named,
                    number,
                } => Some(IssueRef::new(
                    named.unwrap_or_else(|| repository.clone()),
                    number,
                )),
                TaskKind::RepoTitle { .. } | TaskKind::Bare { .. } => None,
            })
            .collect();

        let edit = IssueEdit::close().with_state_reason(source.issue.state_reason);
        let mut closed = 0_usize;
        for issue_ref in &referenced {
            let issue = match tracker.get_issue(issue_ref).await {
                Ok(issue) => issue,
                Err(err) if err.is_not_found() => {
                    tracing::warn!(issue = %issue_ref, "sub-task issue not found");
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            if issue.is_open() {
                tracker.edit_issue(issue_ref, &edit).await?;
                closed = closed.saturating_add(1);
            }
        }
        tracing::info!(issue_ref = %source.issue_ref(), closed, "closed sub-tasks");
        Ok(closed)
    }
}
