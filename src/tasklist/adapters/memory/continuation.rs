//! Continuation trigger that records requests instead of sending them.

use std::sync::{Arc, Mutex};

use crate::tasklist::{domain::IssueRef, ports::ContinuationTrigger};

/// Records every continuation request.
#[derive(Debug, Clone, Default)]
pub struct RecordingContinuation {
    requests: Arc<Mutex<Vec<IssueRef>>>,
}

impl RecordingContinuation {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded requests, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<IssueRef> {
        match self.requests.lock() {
            Ok(requests) => requests.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ContinuationTrigger for RecordingContinuation {
    fn trigger(&self, issue_ref: &IssueRef) {
        match self.requests.lock() {
            Ok(mut requests) => requests.push(issue_ref.clone()),
            Err(poisoned) => poisoned.into_inner().push(issue_ref.clone()),
        }
    }
}
