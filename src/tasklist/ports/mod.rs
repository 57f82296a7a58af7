//! Port contracts for task-list reconciliation.

mod continuation;
mod store;
mod tracker;
mod worker;

#[cfg(test)]
pub use continuation::MockContinuationTrigger;
pub use continuation::ContinuationTrigger;
pub use store::{JobStore, JobStoreError, JobStoreResult, TaskFilter};
pub use tracker::{
    IssueEdit, IssueTracker, IssueTrackerError, IssueTrackerFactory, IssueTrackerResult,
};
pub use worker::{PassError, PassLauncher, PassOutcome, PassResult, RunningPass};
