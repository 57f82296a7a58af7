//! GitHub REST client and tracker factory tests against a mock API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use eyre::ensure;
use httpmock::prelude::*;
use mockable::DefaultClock;
use rstest::rstest;
use serde_json::json;

use super::support::{issue, repo, source_ref};
use crate::tasklist::{
    adapters::github::{
        GitHubIssueTracker, GitHubTrackerFactory, InstallationToken, InstallationTokenProvider,
        StaticTokenProvider,
    },
    domain::{
        CommentId, DEFAULT_BOT_LOGIN, InstallationContext, IssueState, MilestoneNumber,
        StateReason,
    },
    ports::{IssueEdit, IssueTracker, IssueTrackerError, IssueTrackerFactory, IssueTrackerResult},
};

fn tracker(server: &MockServer) -> GitHubIssueTracker {
    GitHubIssueTracker::new(
        &server.base_url(),
        "secret",
        DEFAULT_BOT_LOGIN,
        Duration::from_secs(5),
    )
    .expect("tracker builds")
}

fn comment_by(id: u64, login: &str) -> serde_json::Value {
    json!({ "id": id, "user": { "login": login } })
}

#[tokio::test(flavor = "multi_thread")]
async fn issue_payload_is_read_with_app_headers() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    let fetched = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/1")
                .header("authorization", "Bearer secret")
                .header("x-github-api-version", "2022-11-28");
            then.status(200).json_body(json!({
                "number": 1,
                "title": "Source title",
                "body": null,
                "state": "closed",
                "state_reason": "not_planned",
                "milestone": { "number": 3 }
            }));
        })
        .await;

    let found = tracker(&server).get_issue(&source_ref()).await?;

    fetched.assert_calls_async(1).await;
    ensure!(found.issue_ref == source_ref());
    ensure!(found.title == "Source title");
    ensure!(found.body.is_empty());
    ensure!(found.state == IssueState::Closed);
    ensure!(found.state_reason == Some(StateReason::NotPlanned));
    ensure!(found.milestone == Some(MilestoneNumber::new(3)));
    Ok(())
}

#[rstest]
#[case::missing(404)]
#[case::deleted(410)]
#[tokio::test(flavor = "multi_thread")]
async fn absent_issue_maps_to_not_found(#[case] status: u16) {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/1");
            then.status(status);
        })
        .await;

    let result = tracker(&server).get_issue(&source_ref()).await;

    assert!(matches!(result, Err(IssueTrackerError::NotFound(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_request_keeps_status_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/widgets/issues/1");
            then.status(502).body("upstream unavailable");
        })
        .await;

    let result = tracker(&server).get_issue(&source_ref()).await;

    assert!(matches!(
        result,
        Err(IssueTrackerError::Api { status: 502, ref message }) if message == "upstream unavailable"
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn created_issue_carries_title_and_milestone() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    let created = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/issues")
                .body_includes("\"title\":\"write docs\"")
                .body_includes("\"milestone\":3");
            then.status(201).json_body(json!({ "number": 12 }));
        })
        .await;

    let new_issue = tracker(&server)
        .create_issue(
            &repo("acme/widgets"),
            "write docs",
            Some(MilestoneNumber::new(3)),
        )
        .await?;

    created.assert_calls_async(1).await;
    ensure!(new_issue == issue("acme/widgets", 12));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn closing_edit_sends_state_and_reason() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    let edited = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/repos/acme/widgets/issues/5")
                .body_includes("\"state\":\"closed\"")
                .body_includes("\"state_reason\":\"not_planned\"");
            then.status(200).json_body(json!({ "number": 5 }));
        })
        .await;

    tracker(&server)
        .edit_issue(
            &issue("acme/widgets", 5),
            &IssueEdit::close().with_state_reason(Some(StateReason::NotPlanned)),
        )
        .await?;

    edited.assert_calls_async(1).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn bot_comment_is_found_past_the_first_page() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    let crowded: Vec<serde_json::Value> = (1..=100).map(|id| comment_by(id, "octocat")).collect();
    let first_page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/1/comments")
                .query_param("per_page", "100")
                .query_param("page", "1");
            then.status(200).json_body(json!(crowded));
        })
        .await;
    let second_page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/acme/widgets/issues/1/comments")
                .query_param("page", "2");
            then.status(200)
                .json_body(json!([comment_by(777, DEFAULT_BOT_LOGIN)]));
        })
        .await;
    let edited = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/repos/acme/widgets/issues/comments/777")
                .body_includes("Job's done");
            then.status(200).json_body(comment_by(777, DEFAULT_BOT_LOGIN));
        })
        .await;
    let posted = server
        .mock_async(|when, then| {
            when.method(POST).path("/repos/acme/widgets/issues/1/comments");
            then.status(201).json_body(comment_by(900, DEFAULT_BOT_LOGIN));
        })
        .await;

    let comment = tracker(&server)
        .upsert_comment(&source_ref(), None, "Job's done")
        .await?;

    ensure!(comment == CommentId::new(777));
    first_page.assert_calls_async(1).await;
    second_page.assert_calls_async(1).await;
    edited.assert_calls_async(1).await;
    posted.assert_calls_async(0).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deleted_comment_is_posted_again() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    let edit = server
        .mock_async(|when, then| {
            when.method(PATCH).path("/repos/acme/widgets/issues/comments/5");
            then.status(404);
        })
        .await;
    let posted = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/repos/acme/widgets/issues/1/comments")
                .body_includes("50%");
            then.status(201).json_body(comment_by(900, DEFAULT_BOT_LOGIN));
        })
        .await;

    let comment = tracker(&server)
        .upsert_comment(&source_ref(), Some(CommentId::new(5)), "50%")
        .await?;

    ensure!(comment == CommentId::new(900));
    edit.assert_calls_async(1).await;
    posted.assert_calls_async(1).await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn repository_lookup_returns_canonical_name_or_none() -> eyre::Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/Acme/Widgets");
            then.status(200)
                .json_body(json!({ "full_name": "acme/widgets" }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/repos/acme/gone");
            then.status(404);
        })
        .await;
    let client = tracker(&server);

    let found = client.find_repository(&repo("Acme/Widgets")).await?;
    let missing = client.find_repository(&repo("acme/gone")).await?;

    ensure!(found == Some(repo("acme/widgets")));
    ensure!(missing.is_none());
    Ok(())
}

/// Issues numbered tokens living for `lifetime`, or forever when `None`.
struct RotatingTokens {
    issued: AtomicUsize,
    lifetime: Option<TimeDelta>,
}

impl RotatingTokens {
    const fn new(lifetime: Option<TimeDelta>) -> Self {
        Self {
            issued: AtomicUsize::new(0),
            lifetime,
        }
    }
}

impl InstallationTokenProvider for Arc<RotatingTokens> {
    fn token(&self, _installation: InstallationContext) -> IssueTrackerResult<InstallationToken> {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        let expires_at = self.lifetime.map(|lifetime| Utc::now() + lifetime);
        Ok(InstallationToken::new(format!("token-{serial}"), expires_at))
    }
}

#[rstest]
#[case::long_lived(Some(TimeDelta::hours(1)), 1)]
#[case::near_expiry(Some(TimeDelta::minutes(2)), 2)]
#[case::no_expiry(None, 1)]
fn cached_tracker_lives_as_long_as_its_token(
    #[case] lifetime: Option<TimeDelta>,
    #[case] expected_tokens: usize,
) {
    let tokens = Arc::new(RotatingTokens::new(lifetime));
    let factory = GitHubTrackerFactory::new(
        "http://127.0.0.1:9",
        DEFAULT_BOT_LOGIN,
        Duration::from_secs(1),
        Arc::clone(&tokens),
        Arc::new(DefaultClock),
    );
    let installation = InstallationContext::new(7);

    let first = factory.for_installation(installation).expect("first tracker");
    let second = factory.for_installation(installation).expect("second tracker");

    assert_eq!(tokens.issued.load(Ordering::SeqCst), expected_tokens);
    assert_eq!(Arc::ptr_eq(&first, &second), expected_tokens == 1);
}

#[rstest]
fn blank_token_is_a_credentials_error() {
    let factory = GitHubTrackerFactory::new(
        "http://127.0.0.1:9",
        DEFAULT_BOT_LOGIN,
        Duration::from_secs(1),
        StaticTokenProvider::new("  "),
        Arc::new(DefaultClock),
    );

    let result = factory.for_installation(InstallationContext::new(7));

    assert!(matches!(result, Err(IssueTrackerError::Credentials(7))));
}
