//! In-memory adapters for task-list reconciliation.

mod continuation;
mod store;
mod tracker;
mod worker;

pub use continuation::RecordingContinuation;
pub use store::InMemoryJobStore;
pub use tracker::{InMemoryIssueTracker, StoredComment};
pub use worker::{InProcessPass, InProcessPassLauncher};
