//! Event sequences across seeding, passes and the sub-task sweep.

use std::time::Duration;

use bartholomew::tasklist::{
    domain::{
        IssueAction, IssueJobStatus, IssueState, RepositoryFullName, StateReason, TrackedIssue,
    },
    ports::{JobStore, TaskFilter},
    services::{EventOptions, EventOutcome, ReconcileOptions},
};
use eyre::ensure;
use rstest::rstest;

use super::helpers::{Stack, issue, source_ref, stack};

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn ticking_a_created_issue_closes_it_and_the_source(stack: Stack) -> eyre::Result<()> {
    stack
        .tracker
        .add_repository(&RepositoryFullName::new("acme/batata")?);

    let opened = stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] batata\n- [x] Fry them"))
        .await?;
    ensure!(opened == EventOutcome::Reconciled(IssueJobStatus::Done));
    ensure!(stack.body() == "- [ ] acme/batata#1\n- [x] acme/widgets#2");

    let edited = stack
        .handler
        .handle(&stack.event(IssueAction::Edited, "- [x] acme/batata#1\n- [x] acme/widgets#2"))
        .await?;

    ensure!(edited == EventOutcome::Reconciled(IssueJobStatus::Done));
    ensure!(stack.tracker.is_closed(&issue("acme/batata", 1)));
    let source = stack
        .tracker
        .issue(&source_ref())
        .ok_or_else(|| eyre::eyre!("source issue missing"))?;
    ensure!(source.state == IssueState::Closed);
    ensure!(source.state_reason == Some(StateReason::Completed));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unticking_reopens_a_closed_sub_task(stack: Stack) -> eyre::Result<()> {
    stack
        .tracker
        .add_issue(TrackedIssue::open(issue("acme/widgets", 5), "Five", ""));
    stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [x] #5\n- [ ] write docs"))
        .await?;
    ensure!(stack.tracker.is_closed(&issue("acme/widgets", 5)));
    ensure!(stack.body() == "- [x] #5\n- [ ] acme/widgets#6");

    stack
        .handler
        .handle(&stack.event(IssueAction::Edited, "- [ ] #5\n- [ ] acme/widgets#6"))
        .await?;

    ensure!(!stack.tracker.is_closed(&issue("acme/widgets", 5)));
    ensure!(!stack.tracker.is_closed(&source_ref()));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_edit_creates_nothing_new(stack: Stack) -> eyre::Result<()> {
    stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] one\n- [ ] two"))
        .await?;
    let rewritten = stack.body();

    let outcome = stack
        .handler
        .handle(&stack.event(IssueAction::Edited, &rewritten))
        .await?;

    ensure!(outcome == EventOutcome::Reconciled(IssueJobStatus::Done));
    ensure!(stack.tracker.created_issues().len() == 2);
    ensure!(stack.body() == rewritten);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn added_item_extends_a_finished_job(stack: Stack) -> eyre::Result<()> {
    stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] one"))
        .await?;
    let extended = format!("{}\n- [ ] two", stack.body());

    stack
        .handler
        .handle(&stack.event(IssueAction::Edited, &extended))
        .await?;

    ensure!(stack.body() == "- [ ] acme/widgets#2\n- [ ] acme/widgets#3");
    let tasks = stack
        .store
        .find_tasks(&TaskFilter::for_job(source_ref()))
        .await?;
    ensure!(tasks.len() == 2);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn closing_the_source_sweeps_its_sub_tasks(stack: Stack) -> eyre::Result<()> {
    stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] one\n- [ ] two"))
        .await?;
    let mut closed = stack.event(IssueAction::Closed, &stack.body());
    closed.source.issue.state = IssueState::Closed;
    closed.source.issue.state_reason = Some(StateReason::NotPlanned);

    let outcome = stack.handler.handle(&closed).await?;

    ensure!(outcome == EventOutcome::SubTasksClosed(2));
    for sub_task in [issue("acme/widgets", 2), issue("acme/widgets", 3)] {
        let stored = stack
            .tracker
            .issue(&sub_task)
            .ok_or_else(|| eyre::eyre!("{sub_task} missing"))?;
        ensure!(stored.state_reason == Some(StateReason::NotPlanned));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn overrun_is_finished_by_the_continuation() -> eyre::Result<()> {
    let stack = Stack::with_options(
        ReconcileOptions::default(),
        EventOptions {
            budget: Duration::from_millis(100),
            ..EventOptions::default()
        },
    );
    stack.tracker.stall_creations(true);

    let first = stack
        .handler
        .handle(&stack.event(IssueAction::Opened, "- [ ] one"))
        .await?;
    ensure!(first == EventOutcome::Reconciled(IssueJobStatus::Pending));
    ensure!(stack.continuations.requests() == vec![source_ref()]);

    stack.tracker.stall_creations(false);
    let resumed = stack.handler.continue_job(&source_ref()).await?;

    ensure!(resumed == IssueJobStatus::Done);
    ensure!(stack.tracker.created_issues() == vec![issue("acme/widgets", 2)]);
    ensure!(stack.body() == "- [ ] acme/widgets#2");
    Ok(())
}
