//! In-memory job store contract tests.
#![expect(
    clippy::panic_in_result_fn,
    reason = "tests assert outcomes while propagating setup errors"
)]

use chrono::{DateTime, TimeDelta, Utc};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

use super::support::{issue, source_ref};
use crate::tasklist::{
    adapters::memory::InMemoryJobStore,
    domain::{
        ChecklistItem, ClaimToken, CommentId, InstallationContext, IssueJob, IssueJobStatus,
        SourceIssue, Task, TaskStatus, TrackedIssue,
    },
    ports::{JobStore, JobStoreError, TaskFilter},
};

fn job() -> IssueJob {
    let source = SourceIssue::new(
        TrackedIssue::open(source_ref(), "Source title", "- [ ] x"),
        InstallationContext::new(1),
    );
    IssueJob::new(&source, CommentId::new(5), &DefaultClock)
}

fn task(text: &str) -> Task {
    Task::new(source_ref(), &ChecklistItem::new(text, false), &DefaultClock)
}

#[fixture]
fn store() -> InMemoryJobStore {
    InMemoryJobStore::new()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_job_is_rejected(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;

    let result = store.insert_job(&job()).await;

    assert!(matches!(result, Err(JobStoreError::DuplicateJob(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tasks_need_an_existing_job(store: InMemoryJobStore) {
    let result = store.insert_tasks(&[task("orphan")]).await;

    assert!(matches!(result, Err(JobStoreError::JobNotFound(_))));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_insert_is_all_or_nothing(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;

    let result = store
        .insert_tasks(&[task("one"), task("two"), task("one")])
        .await;

    assert!(matches!(result, Err(JobStoreError::DuplicateTask { .. })));
    let stored = store.find_tasks(&TaskFilter::for_job(source_ref())).await?;
    assert!(stored.is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn tasks_come_back_in_insertion_order(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    store.insert_tasks(&[task("c"), task("a")]).await?;
    store.insert_tasks(&[task("b")]).await?;

    let texts: Vec<String> = store
        .find_tasks(&TaskFilter::for_job(source_ref()))
        .await?
        .iter()
        .map(|stored| stored.raw_text().to_owned())
        .collect();

    assert_eq!(texts, vec!["c", "a", "b"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn resolved_issue_is_unique_per_job(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let mut first = task("#3");
    let mut second = task("acme/widgets#3");
    store.insert_tasks(&[first.clone(), second.clone()]).await?;

    first.bind_existing(issue("acme/widgets", 3), &DefaultClock)?;
    store.update_task(&first).await?;
    second.bind_existing(issue("acme/widgets", 3), &DefaultClock)?;
    let result = store.update_task(&second).await;

    assert!(matches!(
        result,
        Err(JobStoreError::DuplicateResolvedIssue { .. })
    ));
    let pending = store
        .find_tasks(&TaskFilter::for_job(source_ref()).with_status(TaskStatus::Pending))
        .await?;
    assert_eq!(pending.len(), 1);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn batch_update_fails_whole_batch_on_unknown_task(
    store: InMemoryJobStore,
) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let mut known = task("known");
    store.insert_tasks(std::slice::from_ref(&known)).await?;
    known.transition_to(TaskStatus::CreateIssue, &DefaultClock)?;

    let result = store.update_tasks(&[known, task("unknown")]).await;

    assert!(matches!(result, Err(JobStoreError::TaskNotFound(_))));
    let stored = store.find_tasks(&TaskFilter::for_job(source_ref())).await?;
    assert_eq!(
        stored.first().map(Task::status),
        Some(TaskStatus::Pending)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_one_claim_wins(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let now = Utc::now();
    let stale_before = now - TimeDelta::seconds(24);

    let first = store.claim_job(&source_ref(), now, stale_before).await?;
    let second = store.claim_job(&source_ref(), now, stale_before).await?;

    assert_eq!(first.map(|claimed| claimed.status()), Some(IssueJobStatus::Running));
    assert!(second.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn stale_running_job_is_reclaimed(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let started = Utc::now();
    store.claim_job(&source_ref(), started, started).await?;

    let later = started + TimeDelta::seconds(60);
    let reclaimed = store
        .claim_job(&source_ref(), later, later - TimeDelta::seconds(24))
        .await?;

    assert_eq!(
        reclaimed.and_then(|claimed| claimed.running_since()),
        Some(later)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn checkpoint_returns_running_job_to_pending(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let now = Utc::now();
    store.claim_job(&source_ref(), now, now).await?;

    let checkpointed = store
        .checkpoint_job(&source_ref(), ClaimToken::new(now), now)
        .await?;

    assert_eq!(
        checkpointed.map(|stored| stored.status()),
        Some(IssueJobStatus::Pending)
    );
    assert!(
        store
            .checkpoint_job(&issue("acme/widgets", 99), ClaimToken::new(now), now)
            .await?
            .is_none()
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn superseded_claim_cannot_checkpoint(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let started = Utc::now();
    store.claim_job(&source_ref(), started, started).await?;
    let later = started + TimeDelta::seconds(60);
    store.claim_job(&source_ref(), later, started).await?;

    let stored = store
        .checkpoint_job(&source_ref(), ClaimToken::new(started), later)
        .await?;

    assert!(stored.is_some_and(|job| job.is_owned_by(ClaimToken::new(later))));
    Ok(())
}

async fn claimed_and_finished(
    store: &InMemoryJobStore,
    now: DateTime<Utc>,
) -> eyre::Result<IssueJob> {
    store.claim_job(&source_ref(), now, now).await?;
    let mut finished = store
        .find_job(&source_ref())
        .await?
        .ok_or_else(|| eyre::eyre!("job missing"))?;
    finished.transition_to(IssueJobStatus::Done, &DefaultClock)?;
    Ok(finished)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_with_open_tasks_stays_pending(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let now = Utc::now();
    let finished = claimed_and_finished(&store, now).await?;
    store.insert_tasks(&[task("added while running")]).await?;

    let released = store.release_job(&finished, ClaimToken::new(now)).await?;

    assert_eq!(
        released.map(|stored| stored.status()),
        Some(IssueJobStatus::Pending)
    );
    let stored = store.find_job(&source_ref()).await?;
    assert_eq!(
        stored.map(|job| job.status()),
        Some(IssueJobStatus::Pending)
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn release_after_losing_the_claim_writes_nothing(
    store: InMemoryJobStore,
) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let started = Utc::now();
    let finished = claimed_and_finished(&store, started).await?;
    let later = started + TimeDelta::seconds(60);
    store.claim_job(&source_ref(), later, started).await?;

    let released = store
        .release_job(&finished, ClaimToken::new(started))
        .await?;

    assert!(released.is_none());
    let stored = store.find_job(&source_ref()).await?;
    assert!(stored.is_some_and(|job| job.is_owned_by(ClaimToken::new(later))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reopen_moves_done_job_to_pending(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;
    let now = Utc::now();
    let finished = claimed_and_finished(&store, now).await?;
    store.release_job(&finished, ClaimToken::new(now)).await?;

    let reopened = store.reopen_job(&source_ref(), now).await?;

    assert_eq!(
        reopened.map(|stored| stored.status()),
        Some(IssueJobStatus::Pending)
    );
    assert!(store.reopen_job(&issue("acme/widgets", 99), now).await?.is_none());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn progress_comment_is_replaced(store: InMemoryJobStore) -> eyre::Result<()> {
    store.insert_job(&job()).await?;

    store
        .set_progress_comment(&source_ref(), CommentId::new(42))
        .await?;
    let missing = store
        .set_progress_comment(&issue("acme/widgets", 99), CommentId::new(42))
        .await;

    let stored = store.find_job(&source_ref()).await?;
    assert_eq!(
        stored.map(|job| job.progress_comment()),
        Some(CommentId::new(42))
    );
    assert!(matches!(missing, Err(JobStoreError::JobNotFound(_))));
    Ok(())
}
