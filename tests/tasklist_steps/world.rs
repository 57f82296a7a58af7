//! Shared world state for task-list reconciliation scenarios.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bartholomew::tasklist::{
    adapters::memory::{
        InMemoryIssueTracker, InMemoryJobStore, InProcessPassLauncher, RecordingContinuation,
    },
    domain::{ClaimToken, IssueJobStatus, IssueRef, TrackedIssue},
    ports::PassOutcome,
    services::{
        ContinuationController, EventOptions, EventOutcome, IssueEventHandler, ReconcileOptions,
        ReconciliationService, TaskListSeedService,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

type BoxedPass = Pin<Box<dyn Future<Output = PassOutcome> + Send>>;
type PassFn = Box<dyn Fn(IssueRef, ClaimToken) -> BoxedPass + Send + Sync>;

/// Event handler wired to the world's adapters.
pub type WorldHandler = IssueEventHandler<
    InMemoryJobStore,
    InMemoryIssueTracker,
    InProcessPassLauncher<PassFn>,
    RecordingContinuation,
    DefaultClock,
>;

/// Scenario world for task-list reconciliation behaviour tests.
pub struct TaskListWorld {
    pub handler: WorldHandler,
    pub tracker: Arc<InMemoryIssueTracker>,
    pub continuations: RecordingContinuation,
    pub source: Option<TrackedIssue>,
    pub last_outcome: Option<EventOutcome>,
    pub last_status: Option<IssueJobStatus>,
}

impl TaskListWorld {
    /// Creates a world with an empty tracker and store.
    #[must_use]
    pub fn new() -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let tracker = Arc::new(InMemoryIssueTracker::default());
        let clock = Arc::new(DefaultClock);
        let continuations = RecordingContinuation::new();
        let reconciler = Arc::new(ReconciliationService::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&clock),
            ReconcileOptions::default(),
        ));
        let pass: PassFn = Box::new(move |issue_ref: IssueRef, claim: ClaimToken| {
            let service = Arc::clone(&reconciler);
            Box::pin(async move {
                match service.resume(&issue_ref, claim).await {
                    Ok(status) => PassOutcome::Finished(status),
                    Err(err) => PassOutcome::Failed(err.to_string()),
                }
            })
        });
        let controller = ContinuationController::new(
            Arc::clone(&store),
            Arc::new(InProcessPassLauncher::new(pass)),
            Arc::new(continuations.clone()),
            Arc::clone(&clock),
        );
        let seeder = TaskListSeedService::new(store, Arc::clone(&tracker), clock);
        let options = EventOptions {
            budget: Duration::from_millis(500),
            ..EventOptions::default()
        };
        Self {
            handler: IssueEventHandler::new(seeder, controller, Arc::clone(&tracker), options),
            tracker,
            continuations,
            source: None,
            last_outcome: None,
            last_status: None,
        }
    }

    /// Reference of the scenario's source issue.
    #[must_use]
    pub fn source_ref() -> IssueRef {
        IssueRef::from_parts("acme/widgets", 1).expect("valid source reference")
    }
}

impl Default for TaskListWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> TaskListWorld {
    TaskListWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
