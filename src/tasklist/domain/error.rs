//! Error types for task-list domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing or transitioning task-list values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskListDomainError {
    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// The issue number is invalid.
    #[error("invalid issue number {0}, expected a positive integer")]
    InvalidIssueNumber(u64),

    /// The issue reference does not follow `owner/repo#number` format.
    #[error("invalid issue reference '{0}', expected owner/repo#number")]
    InvalidIssueRef(String),

    /// The requested job status transition is not permitted.
    #[error("invalid job transition for {issue_ref}: {from} -> {to}")]
    InvalidJobTransition {
        /// Job whose transition was rejected.
        issue_ref: String,
        /// Status before the attempted transition.
        from: &'static str,
        /// Requested target status.
        to: &'static str,
    },

    /// The requested task status transition is not permitted.
    #[error("invalid task transition for '{raw_text}': {from} -> {to}")]
    InvalidTaskTransition {
        /// Checklist text of the task whose transition was rejected.
        raw_text: String,
        /// Status before the attempted transition.
        from: &'static str,
        /// Requested target status.
        to: &'static str,
    },

    /// A progress comment template failed to render.
    #[error("failed to render progress comment: {0}")]
    Template(String),
}

/// Error returned while parsing persisted status values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown status: {0}")]
pub struct ParseStatusError(pub String);
