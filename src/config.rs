//! Command-line and environment configuration for the service and the
//! worker.
//!
//! Both binaries read the same setting groups. The service hands its
//! resolved settings to workers through [`ServerSettings::worker_env`], so
//! a worker never needs a configuration file.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser};

use crate::tasklist::{
    domain::{ClaimToken, DEFAULT_BOT_LOGIN},
    services::{EventOptions, ReconcileOptions},
};

/// Job store connection settings.
#[derive(Debug, Clone, Args)]
pub struct StoreSettings {
    /// `PostgreSQL` connection URL.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Maximum pooled connections.
    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 4)]
    pub pool_size: u32,
}

/// GitHub API settings.
#[derive(Clone, Args)]
pub struct GitHubSettings {
    /// REST API base URL.
    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    /// Installation access token.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    pub token: String,

    /// Login the bot comments as.
    #[arg(long, env = "BOT_NAME", default_value = DEFAULT_BOT_LOGIN)]
    pub bot_login: String,

    /// Timeout for one API request, in seconds.
    #[arg(long, env = "GITHUB_REQUEST_TIMEOUT", default_value_t = 10)]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_url", &self.api_url)
            .field("token", &"<redacted>")
            .field("bot_login", &self.bot_login)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl GitHubSettings {
    /// Returns the per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Issue-manager toggles and pass limits.
#[derive(Debug, Clone, Args)]
pub struct TaskListSettings {
    /// Handle issue events at all.
    #[arg(long = "issue-manager-enabled", env = "ISSUE_MANAGER_ENABLED", action = ArgAction::Set, default_value_t = true)]
    pub enabled: bool,

    /// Seed and reconcile task lists.
    #[arg(long, env = "ISSUE_MANAGER_HANDLE_TASKLIST", action = ArgAction::Set, default_value_t = true)]
    pub handle_tasklist: bool,

    /// Create issues for items that do not reference one.
    #[arg(long, env = "ISSUE_MANAGER_CREATE_ISSUES_FROM_TASKLIST", action = ArgAction::Set, default_value_t = true)]
    pub create_issues_from_tasklist: bool,

    /// Close the source issue once every item is checked.
    #[arg(long, env = "ISSUE_MANAGER_CLOSE_PARENT", action = ArgAction::Set, default_value_t = true)]
    pub close_parent: bool,

    /// Close referenced issues when the source issue closes.
    #[arg(long, env = "ISSUE_MANAGER_CLOSE_SUBTASKS", action = ArgAction::Set, default_value_t = true)]
    pub close_subtasks: bool,

    /// Open or close referenced issues to follow their checkbox.
    #[arg(long, env = "ISSUE_MANAGER_HANDLE_CHECKBOX", action = ArgAction::Set, default_value_t = true)]
    pub handle_checkbox: bool,

    /// Seconds a request waits for a pass before checkpointing.
    #[arg(long, env = "TIMEOUT", default_value_t = 8)]
    pub timeout_secs: u64,

    /// Budgets after which a running claim counts as abandoned.
    #[arg(long, env = "STALE_AFTER_MULTIPLIER", default_value_t = 3)]
    pub stale_after_multiplier: u32,

    /// Stage rounds per pass.
    #[arg(long, env = "MAX_ROUNDS", default_value_t = 3)]
    pub max_rounds: usize,
}

impl TaskListSettings {
    /// Returns the request budget.
    #[must_use]
    pub const fn budget(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the options applied to reconciliation passes.
    #[must_use]
    pub const fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            sync_checkbox_state: self.handle_checkbox,
            create_issues: self.create_issues_from_tasklist,
            close_parent: self.close_parent,
            stale_after: self.budget().saturating_mul(self.stale_after_multiplier),
            max_rounds: self.max_rounds,
        }
    }

    /// Builds the options applied to issue events.
    #[must_use]
    pub const fn event_options(&self) -> EventOptions {
        EventOptions {
            enabled: self.enabled,
            handle_tasklist: self.handle_tasklist,
            close_subtasks: self.close_subtasks,
            budget: self.budget(),
        }
    }

    fn env(&self) -> Vec<(String, String)> {
        vec![
            env_pair("ISSUE_MANAGER_ENABLED", &self.enabled),
            env_pair("ISSUE_MANAGER_HANDLE_TASKLIST", &self.handle_tasklist),
            env_pair("ISSUE_MANAGER_CREATE_ISSUES_FROM_TASKLIST", &self.create_issues_from_tasklist),
            env_pair("ISSUE_MANAGER_CLOSE_PARENT", &self.close_parent),
            env_pair("ISSUE_MANAGER_CLOSE_SUBTASKS", &self.close_subtasks),
            env_pair("ISSUE_MANAGER_HANDLE_CHECKBOX", &self.handle_checkbox),
            env_pair("TIMEOUT", &self.timeout_secs),
            env_pair("STALE_AFTER_MULTIPLIER", &self.stale_after_multiplier),
            env_pair("MAX_ROUNDS", &self.max_rounds),
        ]
    }
}

/// Settings of the `bartholomew` HTTP service.
#[derive(Debug, Clone, Parser)]
#[command(name = "bartholomew", about = "Reconciles issue task lists into linked issues")]
pub struct ServerSettings {
    /// Address the HTTP service binds to.
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Public base URL of this service, used for continuations.
    #[arg(long, env = "PUBLIC_URL", default_value = "http://127.0.0.1:8000")]
    pub public_url: String,

    /// Path of the worker binary; defaults to `tasklist_worker` next to
    /// the service binary.
    #[arg(long, env = "TASKLIST_WORKER_PATH")]
    pub worker_path: Option<PathBuf>,

    /// Job store settings.
    #[command(flatten)]
    pub store: StoreSettings,

    /// GitHub settings.
    #[command(flatten)]
    pub github: GitHubSettings,

    /// Issue-manager settings.
    #[command(flatten)]
    pub tasklist: TaskListSettings,
}

impl ServerSettings {
    /// Environment handed to every worker process.
    #[must_use]
    pub fn worker_env(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            env_pair("DATABASE_URL", &self.store.database_url),
            env_pair("DATABASE_POOL_SIZE", &1),
            env_pair("GITHUB_API_URL", &self.github.api_url),
            env_pair("GITHUB_TOKEN", &self.github.token),
            env_pair("BOT_NAME", &self.github.bot_login),
            env_pair("GITHUB_REQUEST_TIMEOUT", &self.github.request_timeout_secs),
        ];
        vars.extend(self.tasklist.env());
        vars
    }

    /// Resolves the worker binary path.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when the current executable cannot be located.
    pub fn resolve_worker_path(&self) -> std::io::Result<PathBuf> {
        if let Some(path) = &self.worker_path {
            return Ok(path.clone());
        }
        let current = std::env::current_exe()?;
        Ok(current.with_file_name(format!("tasklist_worker{}", std::env::consts::EXE_SUFFIX)))
    }
}

/// Settings of the `tasklist_worker` binary.
#[derive(Debug, Clone, Parser)]
#[command(name = "tasklist_worker", about = "Runs one reconciliation pass")]
pub struct WorkerSettings {
    /// Job to advance, as `owner/repo#number`.
    pub issue_ref: String,

    /// Claim taken by the supervising service. Without it the worker
    /// claims the job itself.
    #[arg(long)]
    pub claim: Option<ClaimToken>,

    /// Job store settings.
    #[command(flatten)]
    pub store: StoreSettings,

    /// GitHub settings.
    #[command(flatten)]
    pub github: GitHubSettings,

    /// Issue-manager settings.
    #[command(flatten)]
    pub tasklist: TaskListSettings,
}

fn env_pair(key: &str, value: &dyn std::fmt::Display) -> (String, String) {
    (key.to_owned(), value.to_string())
}
