//! Runs one reconciliation pass and reports the job status.
//!
//! Usage:
//!
//! ```text
//! tasklist_worker <owner/repo#number> [--claim <rfc3339 timestamp>]
//! ```
//!
//! With `--claim` the worker only acts while that claim still owns the
//! job.
//!
//! On success the worker prints one JSON line such as
//! `{"status":"done"}` on stdout and exits with status 0. Logs go to
//! stderr. Any failure exits non-zero without a status line; the
//! supervisor then reads the job status from the store.

use std::io::Write;
use std::sync::Arc;

use bartholomew::{
    config::WorkerSettings,
    telemetry,
    tasklist::{
        adapters::{
            github::{GitHubTrackerFactory, StaticTokenProvider},
            postgres::PostgresJobStore,
            process::WorkerReport,
        },
        domain::IssueRef,
        services::ReconciliationService,
    },
};
use clap::Parser;
use mockable::DefaultClock;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let settings = WorkerSettings::parse();
    let issue_ref: IssueRef = settings.issue_ref.parse()?;

    let store = Arc::new(PostgresJobStore::connect(
        &settings.store.database_url,
        settings.store.pool_size,
    )?);
    let clock = Arc::new(DefaultClock);
    let trackers = Arc::new(GitHubTrackerFactory::new(
        settings.github.api_url.clone(),
        settings.github.bot_login.clone(),
        settings.github.request_timeout(),
        StaticTokenProvider::new(settings.github.token.clone()),
        Arc::clone(&clock),
    ));
    let service = ReconciliationService::new(
        store,
        trackers,
        clock,
        settings.tasklist.reconcile_options(),
    );

    let status = match settings.claim {
        Some(claim) => service.resume(&issue_ref, claim).await?,
        None => service.advance(&issue_ref).await?,
    };
    let line = serde_json::to_string(&WorkerReport { status })?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}
