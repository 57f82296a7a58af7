//! `bartholomew` HTTP service.
//!
//! Receives issue webhooks and continuation requests, and supervises one
//! `tasklist_worker` process per reconciliation pass.

use std::sync::Arc;

use bartholomew::{
    config::ServerSettings,
    server, telemetry,
    tasklist::{
        adapters::{
            github::{GitHubTrackerFactory, StaticTokenProvider},
            http::HttpContinuationTrigger,
            postgres::PostgresJobStore,
            process::ProcessPassLauncher,
        },
        services::{ContinuationController, IssueEventHandler, TaskListSeedService},
    },
};
use clap::Parser;
use mockable::DefaultClock;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let settings = ServerSettings::parse();

    let store = Arc::new(PostgresJobStore::connect(
        &settings.store.database_url,
        settings.store.pool_size,
    )?);
    store.apply_schema().await?;

    let clock = Arc::new(DefaultClock);
    let trackers = Arc::new(GitHubTrackerFactory::new(
        settings.github.api_url.clone(),
        settings.github.bot_login.clone(),
        settings.github.request_timeout(),
        StaticTokenProvider::new(settings.github.token.clone()),
        Arc::clone(&clock),
    ));
    let launcher = Arc::new(
        ProcessPassLauncher::new(settings.resolve_worker_path()?).with_env(settings.worker_env()),
    );
    let trigger = Arc::new(HttpContinuationTrigger::new(
        reqwest::Client::new(),
        &settings.public_url,
    ));

    let seeder = TaskListSeedService::new(
        Arc::clone(&store),
        Arc::clone(&trackers),
        Arc::clone(&clock),
    );
    let controller = ContinuationController::new(store, launcher, trigger, clock)
        .with_stale_after(settings.tasklist.reconcile_options().stale_after);
    let handler = Arc::new(IssueEventHandler::new(
        seeder,
        controller,
        trackers,
        settings.tasklist.event_options(),
    ));

    let listener = TcpListener::bind(settings.listen).await?;
    tracing::info!(
        listen = %settings.listen,
        continuation = %settings.public_url,
        "serving task-list reconciliation"
    );
    server::serve(listener, handler).await?;
    Ok(())
}
