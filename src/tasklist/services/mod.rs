//! Application services for task-list reconciliation.

mod continuation;
mod error;
mod events;
mod reconcile;
mod resolver;
mod seed;

pub use continuation::ContinuationController;
pub use error::{TaskListError, TaskListResult};
pub use events::{EventOptions, EventOutcome, IssueEventHandler};
pub use reconcile::{ReconcileOptions, ReconciliationService};
pub use resolver::TaskResolver;
pub use seed::TaskListSeedService;
