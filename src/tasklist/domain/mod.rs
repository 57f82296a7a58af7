//! Domain model for task-list reconciliation.
//!
//! Jobs and tasks are plain records with guarded status transitions. Parsing
//! and classification are pure functions of the issue text, so a resumed
//! pass reaches the same decisions as the pass it replaces.

mod checklist;
mod error;
mod event;
mod ids;
mod issue;
mod job;
mod progress;
mod resolution;
mod task;

pub use checklist::{ChecklistItem, has_checklist, parse_checklist, rewrite_checklist};
pub use error::{ParseStatusError, TaskListDomainError};
pub use event::{IssueAction, IssueEvent};
pub use ids::{
    CommentId, InstallationContext, IssueNumber, MilestoneNumber, RepositoryFullName, TaskId,
};
pub use issue::{IssueRef, IssueState, SourceIssue, StateReason, TrackedIssue};
pub use job::{ClaimToken, IssueJob, IssueJobStatus, PersistedIssueJobData, stale_before};
pub use progress::{DEFAULT_BOT_LOGIN, ProgressReport, percent};
pub use resolution::{CreationTarget, Destination, RepositorySpec, TaskKind};
pub use task::{PersistedTaskData, Task, TaskStatus};
