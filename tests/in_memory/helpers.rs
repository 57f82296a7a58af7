//! Shared test helpers for in-memory integration tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bartholomew::tasklist::{
    adapters::memory::{
        InMemoryIssueTracker, InMemoryJobStore, InProcessPassLauncher, RecordingContinuation,
    },
    domain::{
        ClaimToken, InstallationContext, IssueAction, IssueEvent, IssueRef, SourceIssue,
        TrackedIssue,
    },
    ports::PassOutcome,
    services::{
        ContinuationController, EventOptions, IssueEventHandler, ReconcileOptions,
        ReconciliationService, TaskListSeedService,
    },
};
use mockable::DefaultClock;
use rstest::fixture;

/// Boxed pass future run by the in-process launcher.
pub type BoxedPass = Pin<Box<dyn Future<Output = PassOutcome> + Send>>;

/// Pass function handed to the in-process launcher.
pub type PassFn = Box<dyn Fn(IssueRef, ClaimToken) -> BoxedPass + Send + Sync>;

/// Event handler wired to in-memory adapters.
pub type TestHandler = IssueEventHandler<
    InMemoryJobStore,
    InMemoryIssueTracker,
    InProcessPassLauncher<PassFn>,
    RecordingContinuation,
    DefaultClock,
>;

/// Full service stack over in-memory adapters.
pub struct Stack {
    pub handler: Arc<TestHandler>,
    pub store: Arc<InMemoryJobStore>,
    pub tracker: Arc<InMemoryIssueTracker>,
    pub continuations: RecordingContinuation,
}

impl Stack {
    /// Builds a stack with the given options.
    #[must_use]
    pub fn with_options(reconcile: ReconcileOptions, events: EventOptions) -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let tracker = Arc::new(InMemoryIssueTracker::default());
        let clock = Arc::new(DefaultClock);
        let continuations = RecordingContinuation::new();
        let reconciler = Arc::new(ReconciliationService::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&clock),
            reconcile,
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
        let seeder = TaskListSeedService::new(Arc::clone(&store), Arc::clone(&tracker), clock);
        let handler = IssueEventHandler::new(seeder, controller, Arc::clone(&tracker), events);
        Self {
            handler: Arc::new(handler),
            store,
            tracker,
            continuations,
        }
    }

    /// Stores the source issue with `body`, keeping its state when it
    /// already exists.
    pub fn store_source(&self, body: &str) {
        self.tracker.add_issue(self.updated_source(body));
    }

    /// Stores the source issue with `body` and returns the matching event.
    #[must_use]
    pub fn event(&self, action: IssueAction, body: &str) -> IssueEvent {
        let issue = self.updated_source(body);
        self.tracker.add_issue(issue.clone());
        IssueEvent::new(action, SourceIssue::new(issue, InstallationContext::new(42)))
    }

    fn updated_source(&self, body: &str) -> TrackedIssue {
        self.tracker.issue(&source_ref()).map_or_else(
            || TrackedIssue::open(source_ref(), "Source title", body),
            |mut stored| {
                body.clone_into(&mut stored.body);
                stored
            },
        )
    }

    /// Returns the current source issue body.
    #[must_use]
    pub fn body(&self) -> String {
        self.tracker
            .issue(&source_ref())
            .map(|issue| issue.body)
            .unwrap_or_default()
    }
}

/// Provides a stack with default options.
#[fixture]
pub fn stack() -> Stack {
    Stack::with_options(ReconcileOptions::default(), EventOptions::default())
}

/// Reference of the source issue used by every test.
#[must_use]
pub fn source_ref() -> IssueRef {
    issue("acme/widgets", 1)
}

/// Builds an issue reference.
#[must_use]
pub fn issue(repository: &str, number: u64) -> IssueRef {
    IssueRef::from_parts(repository, number).expect("valid issue reference")
}
