//! HTTP route tests driven through the router without a socket.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use bartholomew::{
    server::{EVENT_HEADER, router},
    tasklist::domain::IssueAction,
};
use eyre::ensure;
use rstest::rstest;
use serde_json::{Value, json};
use tower::ServiceExt;

use super::helpers::{Stack, source_ref, stack};

fn issues_payload(action: &str, body: &str) -> String {
    json!({
        "action": action,
        "issue": {
            "number": 1,
            "title": "Source title",
            "body": body,
            "state": "open"
        },
        "repository": { "full_name": "acme/widgets" },
        "installation": { "id": 42 }
    })
    .to_string()
}

async fn send(stack: &Stack, request: Request<Body>) -> eyre::Result<(StatusCode, Value)> {
    let response = router(Arc::clone(&stack.handler)).oneshot(request).await?;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

fn webhook(event: &str, body: String) -> eyre::Result<Request<Body>> {
    Ok(Request::post("/webhook")
        .header(EVENT_HEADER, event)
        .header("content-type", "application/json")
        .body(Body::from(body))?)
}

fn continuation(issue_ref: &str) -> eyre::Result<Request<Body>> {
    Ok(Request::post("/process-tasklist")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "issue_ref": issue_ref }).to_string()))?)
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn other_events_are_acknowledged_without_work(stack: Stack) -> eyre::Result<()> {
    let (status, _) = send(&stack, webhook("push", "{}".to_owned())?).await?;

    ensure!(status == StatusCode::NO_CONTENT);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn opened_issue_reports_job_status(stack: Stack) -> eyre::Result<()> {
    stack.store_source("- [ ] write docs");

    let (status, body) = send(
        &stack,
        webhook("issues", issues_payload("opened", "- [ ] write docs"))?,
    )
    .await?;

    ensure!(status == StatusCode::OK);
    ensure!(body == json!({ "status": "done" }));
    ensure!(stack.body() == "- [ ] acme/widgets#2");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn issue_without_checklist_is_acknowledged(stack: Stack) -> eyre::Result<()> {
    let (status, _) = send(
        &stack,
        webhook("issues", issues_payload("opened", "Just prose."))?,
    )
    .await?;

    ensure!(status == StatusCode::NO_CONTENT);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_issue_payload_is_rejected(stack: Stack) -> eyre::Result<()> {
    let (status, body) = send(&stack, webhook("issues", "{\"action\":1}".to_owned())?).await?;

    ensure!(status == StatusCode::BAD_REQUEST);
    ensure!(body.get("error").is_some());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn continuation_with_bad_reference_is_rejected(stack: Stack) -> eyre::Result<()> {
    let (status, _) = send(&stack, continuation("not a reference")?).await?;

    ensure!(status == StatusCode::BAD_REQUEST);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn continuation_for_unknown_job_is_not_found(stack: Stack) -> eyre::Result<()> {
    let (status, _) = send(&stack, continuation("acme/widgets#99")?).await?;

    ensure!(status == StatusCode::NOT_FOUND);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn continuation_reports_job_status(stack: Stack) -> eyre::Result<()> {
    stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] write docs"))
        .await?;

    let (status, body) = send(&stack, continuation(&source_ref().to_string())?).await?;

    ensure!(status == StatusCode::OK);
    ensure!(body == json!({ "status": "done" }));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closed_issue_reports_swept_sub_tasks(stack: Stack) -> eyre::Result<()> {
    stack.store_source("- [ ] #7");
    let payload = json!({
        "action": "closed",
        "issue": {
            "number": 1,
            "title": "Source title",
            "body": "- [ ] #7",
            "state": "closed",
            "state_reason": "completed"
        },
        "repository": { "full_name": "acme/widgets" }
    })
    .to_string();

    let (status, body) = send(&stack, webhook("issues", payload)?).await?;

    ensure!(status == StatusCode::OK);
    ensure!(body == json!({ "closed": 0 }));
    Ok(())
}
