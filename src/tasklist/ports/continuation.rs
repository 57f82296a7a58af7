//! Port for re-arming a reconciliation after a timed-out pass.

use crate::tasklist::domain::IssueRef;

/// Requests another pass for a job without waiting for it.
#[cfg_attr(test, mockall::automock)]
pub trait ContinuationTrigger: Send + Sync {
    /// Schedules one continuation for `issue_ref` and returns immediately.
    fn trigger(&self, issue_ref: &IssueRef);
}
