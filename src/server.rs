//! HTTP surface: the webhook receiver and the continuation endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use mockable::Clock;
use serde::Serialize;
use tokio::net::TcpListener;

use crate::tasklist::{
    adapters::http::{ContinuationRequest, parse_issue_event},
    domain::{IssueEvent, IssueJobStatus, IssueRef},
    ports::{ContinuationTrigger, IssueTrackerFactory, JobStore, PassLauncher},
    services::{EventOutcome, IssueEventHandler, TaskListError, TaskListResult},
};

/// Header naming the webhook event type.
pub const EVENT_HEADER: &str = "x-github-event";

/// Operations the HTTP surface dispatches to.
#[async_trait]
pub trait TaskListEndpoints: Send + Sync + 'static {
    /// Handles a decoded issue event.
    async fn handle_event(&self, event: IssueEvent) -> TaskListResult<EventOutcome>;

    /// Runs a bounded pass for an existing job.
    async fn continue_job(&self, issue_ref: IssueRef) -> TaskListResult<IssueJobStatus>;
}

#[async_trait]
impl<R, F, L, T, C> TaskListEndpoints for IssueEventHandler<R, F, L, T, C>
where
    R: JobStore + 'static,
    F: IssueTrackerFactory + 'static,
    L: PassLauncher + 'static,
    T: ContinuationTrigger + ?Sized + 'static,
    C: Clock + Send + Sync + 'static,
{
    async fn handle_event(&self, event: IssueEvent) -> TaskListResult<EventOutcome> {
        self.handle(&event).await
    }

    async fn continue_job(&self, issue_ref: IssueRef) -> TaskListResult<IssueJobStatus> {
        IssueEventHandler::continue_job(self, &issue_ref).await
    }
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: IssueJobStatus,
}

#[derive(Debug, Serialize)]
struct ClosedBody {
    closed: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Builds the service router.
pub fn router<E>(endpoints: Arc<E>) -> Router
where
    E: TaskListEndpoints,
{
    Router::new()
        .route("/process-tasklist", post(process_tasklist::<E>))
        .route("/webhook", post(webhook::<E>))
        .with_state(endpoints)
}

/// Serves the router on `listener` until the server stops.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<E>(listener: TcpListener, endpoints: Arc<E>) -> std::io::Result<()>
where
    E: TaskListEndpoints,
{
    axum::serve(listener, router(endpoints)).await
}

async fn process_tasklist<E>(
    State(endpoints): State<Arc<E>>,
    Json(request): Json<ContinuationRequest>,
) -> Response
where
    E: TaskListEndpoints,
{
    let issue_ref = match request.issue_ref.parse::<IssueRef>() {
        Ok(issue_ref) => issue_ref,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    match endpoints.continue_job(issue_ref).await {
        Ok(status) => (StatusCode::OK, Json(StatusBody { status })).into_response(),
        Err(err) => task_list_error_response(&err),
    }
}

async fn webhook<E>(State(endpoints): State<Arc<E>>, headers: HeaderMap, body: Bytes) -> Response
where
    E: TaskListEndpoints,
{
    let event_name = headers
        .get(EVENT_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if event_name != "issues" {
        tracing::debug!(event = event_name, "ignoring webhook event");
        return StatusCode::NO_CONTENT.into_response();
    }
    let event = match parse_issue_event(&body) {
        Ok(event) => event,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err),
    };
    match endpoints.handle_event(event).await {
        Ok(EventOutcome::Ignored) => StatusCode::NO_CONTENT.into_response(),
        Ok(EventOutcome::Reconciled(status)) => {
            (StatusCode::OK, Json(StatusBody { status })).into_response()
        }
        Ok(EventOutcome::SubTasksClosed(closed)) => {
            (StatusCode::OK, Json(ClosedBody { closed })).into_response()
        }
        Err(err) => task_list_error_response(&err),
    }
}

fn task_list_error_response(err: &TaskListError) -> Response {
    match err {
        TaskListError::JobNotFound(_) => error_response(StatusCode::NOT_FOUND, err),
        TaskListError::NoChecklist(_) => error_response(StatusCode::UNPROCESSABLE_ENTITY, err),
        _ => {
            tracing::error!(error = %err, "request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

fn error_response(status: StatusCode, err: &dyn std::error::Error) -> Response {
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
        .into_response()
}
