//! Given steps for task-list reconciliation scenarios.

use bartholomew::tasklist::domain::{IssueRef, RepositoryFullName, TrackedIssue};
use eyre::WrapErr;
use rstest_bdd_macros::given;

use super::world::TaskListWorld;

#[given("a repository \"{name}\"")]
fn repository(world: &mut TaskListWorld, name: String) -> Result<(), eyre::Report> {
    let repository = RepositoryFullName::new(name).wrap_err("parse repository name")?;
    world.tracker.add_repository(&repository);
    Ok(())
}

#[given("an open issue \"{reference}\"")]
fn open_issue(world: &mut TaskListWorld, reference: String) -> Result<(), eyre::Report> {
    let issue_ref: IssueRef = reference.parse().wrap_err("parse issue reference")?;
    world
        .tracker
        .add_issue(TrackedIssue::open(issue_ref, "Referenced issue", ""));
    Ok(())
}

#[given("a source issue with the task list \"{body}\"")]
fn source_issue(world: &mut TaskListWorld, body: String) {
    let issue = TrackedIssue::open(TaskListWorld::source_ref(), "Source title", body);
    world.tracker.add_issue(issue.clone());
    world.source = Some(issue);
}

#[given("issue creation hangs")]
fn creation_hangs(world: &mut TaskListWorld) {
    world.tracker.stall_creations(true);
}
