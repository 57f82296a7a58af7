//! Pass launcher running each pass in a child worker process.
//!
//! The worker resumes the job under the supervisor's claim, prints one
//! [`WorkerReport`] line on stdout and logs to stderr.
//! Killing the process is the only way a pass is interrupted, so no pass
//! state outlives a timeout except what the worker already committed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::tasklist::{
    domain::{ClaimToken, IssueJobStatus, IssueRef},
    ports::{PassError, PassLauncher, PassOutcome, PassResult, RunningPass},
};

/// Status line written by the worker on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    /// Job status at the end of the pass.
    pub status: IssueJobStatus,
}

/// Launches the worker binary once per pass.
#[derive(Debug, Clone)]
pub struct ProcessPassLauncher {
    program: PathBuf,
    env: Vec<(String, String)>,
}

impl ProcessPassLauncher {
    /// Creates a launcher for the worker at `program`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            env: Vec::new(),
        }
    }

    /// Adds environment variables passed to every worker.
    #[must_use]
    pub fn with_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(vars);
        self
    }
}

/// Handle to a running worker process.
#[derive(Debug)]
pub struct ProcessPass {
    child: Child,
    stdout: String,
}

#[async_trait]
impl PassLauncher for ProcessPassLauncher {
    type Pass = ProcessPass;

    async fn launch(&self, issue_ref: &IssueRef, claim: ClaimToken) -> PassResult<Self::Pass> {
        let child = Command::new(&self.program)
            .arg(issue_ref.to_string())
            .arg("--claim")
            .arg(claim.to_string())
            .envs(self.env.iter().map(|(key, value)| (key, value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(PassError::launch)?;
        tracing::debug!(
            issue_ref = %issue_ref,
            pid = child.id(),
            "launched reconciliation worker"
        );
        Ok(ProcessPass {
            child,
            stdout: String::new(),
        })
    }
}

#[async_trait]
impl RunningPass for ProcessPass {
    async fn wait(&mut self) -> PassResult<PassOutcome> {
        if let Some(mut stdout) = self.child.stdout.take() {
            let mut buffer = Vec::new();
            stdout
                .read_to_end(&mut buffer)
                .await
                .map_err(PassError::wait)?;
            self.stdout.push_str(&String::from_utf8_lossy(&buffer));
        }
        let exit = self.child.wait().await.map_err(PassError::wait)?;
        if !exit.success() {
            return Ok(PassOutcome::Failed(format!("worker exited with {exit}")));
        }
        Ok(parse_report(&self.stdout))
    }

    async fn terminate(&mut self) -> PassResult<()> {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return Ok(());
        }
        self.child.kill().await.map_err(PassError::terminate)
    }
}

/// Reads the last report line of a worker's stdout.
#[must_use]
pub fn parse_report(stdout: &str) -> PassOutcome {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| serde_json::from_str::<WorkerReport>(line).ok())
        .map_or_else(
            || PassOutcome::Failed("worker reported no status".to_owned()),
            |report| PassOutcome::Finished(report.status),
        )
}
