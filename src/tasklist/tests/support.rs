//! Shared fixtures for task-list unit tests.

use std::pin::Pin;
use std::sync::Arc;

use mockable::DefaultClock;
use rstest::fixture;

use crate::tasklist::{
    adapters::memory::{InMemoryIssueTracker, InMemoryJobStore, InProcessPassLauncher},
    domain::{
        ClaimToken, InstallationContext, IssueRef, RepositoryFullName, SourceIssue, TrackedIssue,
    },
    ports::PassOutcome,
    services::{ReconcileOptions, ReconciliationService, TaskListSeedService},
};

pub type TestSeeder = TaskListSeedService<InMemoryJobStore, InMemoryIssueTracker, DefaultClock>;
pub type TestReconciler =
    ReconciliationService<InMemoryJobStore, InMemoryIssueTracker, DefaultClock>;

/// In-memory store and tracker wired to both services.
pub struct Harness {
    pub store: Arc<InMemoryJobStore>,
    pub tracker: Arc<InMemoryIssueTracker>,
    pub seeder: TestSeeder,
    pub reconciler: TestReconciler,
}

impl Harness {
    pub fn with_options(options: ReconcileOptions) -> Self {
        let store = Arc::new(InMemoryJobStore::new());
        let tracker = Arc::new(InMemoryIssueTracker::default());
        let clock = Arc::new(DefaultClock);
        Self {
            seeder: TaskListSeedService::new(
                Arc::clone(&store),
                Arc::clone(&tracker),
                Arc::clone(&clock),
            ),
            reconciler: ReconciliationService::new(
                Arc::clone(&store),
                Arc::clone(&tracker),
                clock,
                options,
            ),
            store,
            tracker,
        }
    }

    /// Registers the source issue with `body` and returns it as an event
    /// would deliver it.
    pub fn source(&self, body: &str) -> SourceIssue {
        Self::source_on(&self.tracker, body)
    }

    pub fn source_on(tracker: &InMemoryIssueTracker, body: &str) -> SourceIssue {
        let issue = TrackedIssue::open(source_ref(), "Source title", body);
        tracker.add_issue(issue.clone());
        SourceIssue::new(issue, InstallationContext::new(42))
    }

    pub fn body(&self) -> String {
        self.tracker
            .issue(&source_ref())
            .map(|issue| issue.body)
            .unwrap_or_default()
    }
}

pub type BoxedPass = Pin<Box<dyn Future<Output = PassOutcome> + Send>>;
pub type PassFn = Box<dyn Fn(IssueRef, ClaimToken) -> BoxedPass + Send + Sync>;

/// Launcher running real passes of `reconciler` as runtime tasks.
pub fn reconciling_launcher(reconciler: TestReconciler) -> InProcessPassLauncher<PassFn> {
    let reconciler = Arc::new(reconciler);
    let pass: PassFn = Box::new(move |issue_ref: IssueRef, claim: ClaimToken| {
        let service = Arc::clone(&reconciler);
        Box::pin(async move {
            match service.resume(&issue_ref, claim).await {
                Ok(status) => PassOutcome::Finished(status),
                Err(err) => PassOutcome::Failed(err.to_string()),
            }
        })
    });
    InProcessPassLauncher::new(pass)
}

#[fixture]
pub fn harness() -> Harness {
    Harness::with_options(ReconcileOptions::default())
}

pub fn repo(name: &str) -> RepositoryFullName {
    RepositoryFullName::new(name).expect("valid repository name")
}

pub fn issue(repository: &str, number: u64) -> IssueRef {
    IssueRef::from_parts(repository, number).expect("valid issue reference")
}

pub fn source_ref() -> IssueRef {
    issue("acme/widgets", 1)
}
