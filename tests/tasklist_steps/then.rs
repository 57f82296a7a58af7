//! Then steps for task-list reconciliation scenarios.

use bartholomew::tasklist::{
    domain::{IssueRef, IssueState, StateReason},
    services::EventOutcome,
};
use eyre::WrapErr;
use rstest_bdd_macros::then;

use super::world::TaskListWorld;

#[then("the job status is \"{expected}\"")]
fn job_status(world: &TaskListWorld, expected: String) -> Result<(), eyre::Report> {
    let status = world
        .last_status
        .ok_or_else(|| eyre::eyre!("no job status recorded in scenario world"))?;
    if status.as_str() != expected {
        return Err(eyre::eyre!(
            "expected job status {expected}, found {}",
            status.as_str()
        ));
    }
    Ok(())
}

#[then("the source issue body reads \"{expected}\"")]
fn source_body(world: &TaskListWorld, expected: String) -> Result<(), eyre::Report> {
    let body = world
        .tracker
        .issue(&TaskListWorld::source_ref())
        .map(|issue| issue.body)
        .ok_or_else(|| eyre::eyre!("source issue missing from tracker"))?;
    if body != expected {
        return Err(eyre::eyre!("expected body {expected:?}, found {body:?}"));
    }
    Ok(())
}

#[then("the issue \"{reference}\" has the title \"{title}\"")]
fn issue_title(world: &TaskListWorld, reference: String, title: String) -> Result<(), eyre::Report> {
    let issue_ref: IssueRef = reference.parse().wrap_err("parse issue reference")?;
    let issue = world
        .tracker
        .issue(&issue_ref)
        .ok_or_else(|| eyre::eyre!("issue {issue_ref} was not created"))?;
    if issue.title != title {
        return Err(eyre::eyre!(
            "expected title {title:?}, found {:?}",
            issue.title
        ));
    }
    Ok(())
}

#[then("the issue \"{reference}\" is closed")]
fn issue_closed(world: &TaskListWorld, reference: String) -> Result<(), eyre::Report> {
    let issue_ref: IssueRef = reference.parse().wrap_err("parse issue reference")?;
    if !world.tracker.is_closed(&issue_ref) {
        return Err(eyre::eyre!("expected issue {issue_ref} to be closed"));
    }
    Ok(())
}

#[then("the source issue is closed as completed")]
fn source_closed_completed(world: &TaskListWorld) -> Result<(), eyre::Report> {
    let source = world
        .tracker
        .issue(&TaskListWorld::source_ref())
        .ok_or_else(|| eyre::eyre!("source issue missing from tracker"))?;
    if source.state != IssueState::Closed || source.state_reason != Some(StateReason::Completed) {
        return Err(eyre::eyre!(
            "expected source closed as completed, found {:?} {:?}",
            source.state,
            source.state_reason
        ));
    }
    Ok(())
}

#[then("{count:usize} continuation was requested")]
fn continuations_requested(world: &TaskListWorld, count: usize) -> Result<(), eyre::Report> {
    let requested = world.continuations.requests().len();
    if requested != count {
        return Err(eyre::eyre!(
            "expected {count} continuation requests, found {requested}"
        ));
    }
    Ok(())
}

#[then("{count:usize} issue was created")]
fn issues_created(world: &TaskListWorld, count: usize) -> Result<(), eyre::Report> {
    let created = world.tracker.created_issues().len();
    if created != count {
        return Err(eyre::eyre!("expected {count} created issues, found {created}"));
    }
    Ok(())
}

#[then("{count:usize} sub-task was closed")]
fn sub_tasks_closed(world: &TaskListWorld, count: usize) -> Result<(), eyre::Report> {
    match world.last_outcome {
        Some(EventOutcome::SubTasksClosed(closed)) if closed == count => Ok(()),
        other => Err(eyre::eyre!(
            "expected {count} closed sub-tasks, found {other:?}"
        )),
    }
}
