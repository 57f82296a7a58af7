//! In-memory issue tracker with call recording.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use crate::tasklist::{
    domain::{
        CommentId, DEFAULT_BOT_LOGIN, InstallationContext, IssueNumber, IssueRef, IssueState,
        MilestoneNumber, RepositoryFullName, TrackedIssue,
    },
    ports::{
        IssueEdit, IssueTracker, IssueTrackerError, IssueTrackerFactory, IssueTrackerResult,
    },
};

/// Comment stored by [`InMemoryIssueTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredComment {
    /// Comment identifier.
    pub id: CommentId,
    /// Issue the comment belongs to.
    pub issue_ref: IssueRef,
    /// Login of the author.
    pub author: String,
    /// Comment text.
    pub body: String,
}

/// Issue tracker held in memory.
///
/// Clones share state, so the tracker doubles as its own
/// [`IssueTrackerFactory`].
#[derive(Debug, Clone)]
pub struct InMemoryIssueTracker {
    bot_login: String,
    state: Arc<RwLock<TrackerState>>,
}

#[derive(Debug, Default)]
struct TrackerState {
    repositories: BTreeSet<RepositoryFullName>,
    issues: BTreeMap<IssueRef, TrackedIssue>,
    comments: Vec<StoredComment>,
    created: Vec<IssueRef>,
    edits: Vec<(IssueRef, IssueEdit)>,
    next_comment_id: u64,
    failing_creations: Option<IssueTrackerError>,
    stalled_creations: bool,
}

impl Default for InMemoryIssueTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_LOGIN)
    }
}

impl InMemoryIssueTracker {
    /// Creates an empty tracker whose comments are authored by `bot_login`.
    #[must_use]
    pub fn new(bot_login: impl Into<String>) -> Self {
        Self {
            bot_login: bot_login.into(),
            state: Arc::new(RwLock::new(TrackerState::default())),
        }
    }

    /// Registers a repository.
    pub fn add_repository(&self, repository: &RepositoryFullName) {
        self.mutate(|state| {
            state.repositories.insert(repository.clone());
        });
    }

    /// Stores an issue, registering its repository.
    pub fn add_issue(&self, issue: TrackedIssue) {
        self.mutate(|state| {
            state
                .repositories
                .insert(issue.issue_ref.repository().clone());
            state.issues.insert(issue.issue_ref.clone(), issue);
        });
    }

    /// Adds a comment written by `author`.
    pub fn add_comment(&self, issue_ref: &IssueRef, author: &str, body: &str) -> CommentId {
        self.mutate(|state| push_comment(state, issue_ref, author, body))
    }

    /// Returns the stored issue.
    #[must_use]
    pub fn issue(&self, issue_ref: &IssueRef) -> Option<TrackedIssue> {
        self.inspect(|state| state.issues.get(issue_ref).cloned())
    }

    /// Returns `true` when the stored issue is closed.
    #[must_use]
    pub fn is_closed(&self, issue_ref: &IssueRef) -> bool {
        self.issue(issue_ref)
            .is_some_and(|issue| issue.state == IssueState::Closed)
    }

    /// Returns the issues created through the tracker, in creation order.
    #[must_use]
    pub fn created_issues(&self) -> Vec<IssueRef> {
        self.inspect(|state| state.created.clone())
    }

    /// Returns every edit applied through the tracker, in call order.
    #[must_use]
    pub fn edits(&self) -> Vec<(IssueRef, IssueEdit)> {
        self.inspect(|state| state.edits.clone())
    }

    /// Returns the comments on an issue, oldest first.
    #[must_use]
    pub fn comments(&self, issue_ref: &IssueRef) -> Vec<StoredComment> {
        self.inspect(|state| {
            state
                .comments
                .iter()
                .filter(|comment| &comment.issue_ref == issue_ref)
                .cloned()
                .collect()
        })
    }

    /// Deletes a comment the way a user would on the issue page.
    pub fn remove_comment(&self, comment: CommentId) {
        self.mutate(|state| state.comments.retain(|stored| stored.id != comment));
    }

    /// Makes every following issue creation fail with `error`, or succeed
    /// again with `None`.
    pub fn fail_creations(&self, error: Option<IssueTrackerError>) {
        self.mutate(|state| state.failing_creations = error);
    }

    /// Makes every following issue creation hang until the tracker is told
    /// otherwise.
    pub fn stall_creations(&self, stalled: bool) {
        self.mutate(|state| state.stalled_creations = stalled);
    }

    fn inspect<T>(&self, f: impl FnOnce(&TrackerState) -> T) -> T {
        match self.state.read() {
            Ok(state) => f(&state),
            Err(poisoned) => f(&poisoned.into_inner()),
        }
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut TrackerState) -> T) -> T {
        match self.state.write() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

fn push_comment(
    state: &mut TrackerState,
    issue_ref: &IssueRef,
    author: &str,
    body: &str,
) -> CommentId {
    state.next_comment_id = state.next_comment_id.saturating_add(1);
    let id = CommentId::new(state.next_comment_id);
    state.comments.push(StoredComment {
        id,
        issue_ref: issue_ref.clone(),
        author: author.to_owned(),
        body: body.to_owned(),
    });
    id
}

fn next_issue_number(state: &TrackerState, repository: &RepositoryFullName) -> u64 {
    state
        .issues
        .keys()
        .filter(|issue_ref| issue_ref.repository() == repository)
        .map(|issue_ref| issue_ref.number().value())
        .max()
        .unwrap_or_default()
        .saturating_add(1)
}

#[async_trait]
impl IssueTracker for InMemoryIssueTracker {
    async fn get_issue(&self, issue_ref: &IssueRef) -> IssueTrackerResult<TrackedIssue> {
        self.inspect(|state| state.issues.get(issue_ref).cloned())
            .ok_or_else(|| IssueTrackerError::NotFound(issue_ref.to_string()))
    }

    async fn edit_issue(&self, issue_ref: &IssueRef, edit: &IssueEdit) -> IssueTrackerResult<()> {
        self.mutate(|state| {
            let issue = state
                .issues
                .get_mut(issue_ref)
                .ok_or_else(|| IssueTrackerError::NotFound(issue_ref.to_string()))?;
            if let Some(issue_state) = edit.state {
                issue.state = issue_state;
                issue.state_reason = edit.state_reason;
            }
            if let Some(body) = &edit.body {
                issue.body.clone_from(body);
            }
            state.edits.push((issue_ref.clone(), edit.clone()));
            Ok(())
        })
    }

    async fn create_issue(
        &self,
        repository: &RepositoryFullName,
        title: &str,
        milestone: Option<MilestoneNumber>,
    ) -> IssueTrackerResult<IssueRef> {
        if self.inspect(|state| state.stalled_creations) {
            std::future::pending::<()>().await;
        }
        self.mutate(|state| {
            if let Some(error) = &state.failing_creations {
                return Err(error.clone());
            }
            if !state.repositories.contains(repository) {
                return Err(IssueTrackerError::NotFound(repository.to_string()));
            }
            let number = IssueNumber::new(next_issue_number(state, repository))
                .map_err(IssueTrackerError::transport)?;
            let issue_ref = IssueRef::new(repository.clone(), number);
            let mut issue = TrackedIssue::open(issue_ref.clone(), title, "");
            issue.milestone = milestone;
            state.issues.insert(issue_ref.clone(), issue);
            state.created.push(issue_ref.clone());
            Ok(issue_ref)
        })
    }

    async fn upsert_comment(
        &self,
        issue_ref: &IssueRef,
        comment: Option<CommentId>,
        text: &str,
    ) -> IssueTrackerResult<CommentId> {
        let bot_login = self.bot_login.as_str();
        self.mutate(|state| {
            if !state.issues.contains_key(issue_ref) {
                return Err(IssueTrackerError::NotFound(issue_ref.to_string()));
            }
            let existing = state.comments.iter_mut().find(|stored| {
                &stored.issue_ref == issue_ref
                    && comment.map_or(stored.author == bot_login, |id| stored.id == id)
            });
            if let Some(stored) = existing {
                text.clone_into(&mut stored.body);
                return Ok(stored.id);
            }
            Ok(push_comment(state, issue_ref, bot_login, text))
        })
    }

    async fn find_repository(
        &self,
        repository: &RepositoryFullName,
    ) -> IssueTrackerResult<Option<RepositoryFullName>> {
        Ok(self.inspect(|state| {
            state
                .repositories
                .iter()
                .find(|known| known.as_str().eq_ignore_ascii_case(repository.as_str()))
                .cloned()
        }))
    }
}

impl IssueTrackerFactory for InMemoryIssueTracker {
    type Tracker = Self;

    fn for_installation(
        &self,
        _installation: InstallationContext,
    ) -> IssueTrackerResult<Arc<Self::Tracker>> {
        Ok(Arc::new(self.clone()))
    }
}
