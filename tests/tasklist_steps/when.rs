//! When steps for task-list reconciliation scenarios.

use bartholomew::tasklist::{
    domain::{
        InstallationContext, IssueAction, IssueEvent, IssueState, SourceIssue, StateReason,
    },
    services::EventOutcome,
};
use rstest_bdd_macros::when;

use super::world::{TaskListWorld, run_async};

fn deliver(world: &mut TaskListWorld, action: IssueAction) -> Result<(), eyre::Report> {
    let issue = world
        .source
        .clone()
        .ok_or_else(|| eyre::eyre!("missing source issue in scenario world"))?;
    let event = IssueEvent::new(action, SourceIssue::new(issue, InstallationContext::new(42)));
    let outcome = run_async(world.handler.handle(&event))
        .map_err(|err| eyre::eyre!("event handling failed: {err}"))?;
    if let EventOutcome::Reconciled(status) = outcome {
        world.last_status = Some(status);
    }
    world.last_outcome = Some(outcome);
    Ok(())
}

#[when("the source issue is opened")]
fn source_opened(world: &mut TaskListWorld) -> Result<(), eyre::Report> {
    deliver(world, IssueAction::Opened)
}

#[when("the source issue is closed as not planned")]
fn source_closed(world: &mut TaskListWorld) -> Result<(), eyre::Report> {
    let issue = world
        .source
        .as_mut()
        .ok_or_else(|| eyre::eyre!("missing source issue in scenario world"))?;
    issue.state = IssueState::Closed;
    issue.state_reason = Some(StateReason::NotPlanned);
    world.tracker.add_issue(issue.clone());
    deliver(world, IssueAction::Closed)
}

#[when("issue creation recovers")]
fn creation_recovers(world: &mut TaskListWorld) {
    world.tracker.stall_creations(false);
}

#[when("the continuation runs")]
fn continuation_runs(world: &mut TaskListWorld) -> Result<(), eyre::Report> {
    let status = run_async(world.handler.continue_job(&TaskListWorld::source_ref()))
        .map_err(|err| eyre::eyre!("continuation failed: {err}"))?;
    world.last_status = Some(status);
    Ok(())
}
