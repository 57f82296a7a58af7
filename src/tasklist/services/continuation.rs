//! Time-bounded supervision of reconciliation passes.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use super::{TaskListError, TaskListResult};
use crate::tasklist::{
    domain::{ClaimToken, IssueJob, IssueJobStatus, IssueRef, stale_before},
    ports::{ContinuationTrigger, JobStore, PassLauncher, PassOutcome, RunningPass},
};

const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(24);

/// Runs one pass in a disposable worker and re-arms the job when the
/// worker outlives its budget.
///
/// The controller claims the job before launching, so at most one worker
/// acts on a job at a time and every checkpoint is tied to that claim.
pub struct ContinuationController<R, L, T, C>
where
    R: JobStore,
    L: PassLauncher,
    T: ContinuationTrigger + ?Sized,
    C: Clock + Send + Sync,
{
    store: Arc<R>,
    launcher: Arc<L>,
    trigger: Arc<T>,
    clock: Arc<C>,
    stale_after: Duration,
}

impl<R, L, T, C> ContinuationController<R, L, T, C>
where
    R: JobStore,
    L: PassLauncher,
    T: ContinuationTrigger + ?Sized,
    C: Clock + Send + Sync,
{
    /// Creates a controller.
    #[must_use]
    pub const fn new(store: Arc<R>, launcher: Arc<L>, trigger: Arc<T>, clock: Arc<C>) -> Self {
        Self {
            store,
            launcher,
            trigger,
            clock,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Sets the age after which another invocation's claim counts as
    /// abandoned.
    #[must_use]
    pub const fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    /// Runs a pass for `issue_ref`, waiting at most `budget`.
    ///
    /// A job owned by a live claim of another invocation is left alone and
    /// its status returned. When the budget runs out the worker is killed
    /// first, then the job is checkpointed back to pending and one
    /// continuation is fired. The continuation is never awaited. A worker
    /// that fails or hands a pending job back is treated the same way.
    ///
    /// # Errors
    ///
    /// Returns [`TaskListError::JobNotFound`] for an unknown job, and
    /// propagates worker supervision and store failures.
    pub async fn run_bounded(
        &self,
        issue_ref: &IssueRef,
        budget: Duration,
    ) -> TaskListResult<IssueJobStatus> {
        let job = self.current(issue_ref).await?;
        if job.status().is_terminal() {
            return Ok(job.status());
        }
        let now = self.clock.utc();
        let claim = self
            .store
            .claim_job(issue_ref, now, stale_before(now, self.stale_after))
            .await?
            .and_then(|claimed| claimed.claim_token());
        let Some(claim) = claim else {
            let status = self.current(issue_ref).await?.status();
            tracing::debug!(
                issue_ref = %issue_ref,
                status = status.as_str(),
                "job owned by another pass"
            );
            return Ok(status);
        };

        let mut pass = match self.launcher.launch(issue_ref, claim).await {
            Ok(pass) => pass,
            Err(err) => {
                self.store
                    .checkpoint_job(issue_ref, claim, self.clock.utc())
                    .await?;
                return Err(err.into());
            }
        };
        let waited = tokio::time::timeout(budget, pass.wait()).await;
        match waited {
            Ok(outcome) => self.finished(issue_ref, claim, outcome?).await,
            Err(_) => {
                tracing::info!(
                    issue_ref = %issue_ref,
                    budget = ?budget,
                    "pass exceeded its budget"
                );
                pass.terminate().await?;
                self.checkpoint(issue_ref, claim).await
            }
        }
    }

    async fn current(&self, issue_ref: &IssueRef) -> TaskListResult<IssueJob> {
        self.store
            .find_job(issue_ref)
            .await?
            .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone()))
    }

    async fn finished(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
        outcome: PassOutcome,
    ) -> TaskListResult<IssueJobStatus> {
        match outcome {
            PassOutcome::Finished(IssueJobStatus::Pending) => self.checkpoint(issue_ref, claim).await,
            PassOutcome::Finished(status) => Ok(status),
            PassOutcome::Failed(reason) => {
                tracing::warn!(issue_ref = %issue_ref, reason = %reason, "pass failed");
                self.checkpoint(issue_ref, claim).await
            }
        }
    }

    /// Hands the job back to pending if `claim` still owns it, and fires
    /// one continuation when the job ends up pending.
    async fn checkpoint(
        &self,
        issue_ref: &IssueRef,
        claim: ClaimToken,
    ) -> TaskListResult<IssueJobStatus> {
        let job = self
            .store
            .checkpoint_job(issue_ref, claim, self.clock.utc())
            .await?
            .ok_or_else(|| TaskListError::JobNotFound(issue_ref.clone()))?;
        if job.status() == IssueJobStatus::Pending {
            self.trigger.trigger(issue_ref);
            tracing::info!(issue_ref = %issue_ref, "checkpointed job, continuation requested");
        }
        Ok(job.status())
    }
}
