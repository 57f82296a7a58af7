//! Ports for running reconciliation passes in disposable workers.

use crate::tasklist::domain::{ClaimToken, IssueJobStatus, IssueRef};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for worker operations.
pub type PassResult<T> = Result<T, PassError>;

/// How a worker ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass returned a job status.
    Finished(IssueJobStatus),
    /// The pass aborted without a status.
    Failed(String),
}

/// Starts reconciliation passes that can be stopped at any point.
#[async_trait]
pub trait PassLauncher: Send + Sync {
    /// Handle type for a started pass.
    type Pass: RunningPass;

    /// Starts a pass for `issue_ref` acting under `claim`.
    ///
    /// # Errors
    ///
    /// Returns [`PassError::Launch`] when the worker cannot be started.
    async fn launch(&self, issue_ref: &IssueRef, claim: ClaimToken) -> PassResult<Self::Pass>;
}

/// A started pass.
#[async_trait]
pub trait RunningPass: Send {
    /// Waits for the pass to end.
    ///
    /// Dropping the returned future before completion leaves the worker
    /// running; call [`RunningPass::terminate`] afterwards.
    async fn wait(&mut self) -> PassResult<PassOutcome>;

    /// Stops the worker immediately.
    async fn terminate(&mut self) -> PassResult<()>;
}

/// Errors raised while supervising a worker.
#[derive(Debug, Clone, Error)]
pub enum PassError {
    /// The worker could not be started.
    #[error("failed to launch reconciliation worker: {0}")]
    Launch(Arc<dyn std::error::Error + Send + Sync>),

    /// The worker could not be observed.
    #[error("failed to wait for reconciliation worker: {0}")]
    Wait(Arc<dyn std::error::Error + Send + Sync>),

    /// The worker could not be stopped.
    #[error("failed to terminate reconciliation worker: {0}")]
    Terminate(Arc<dyn std::error::Error + Send + Sync>),
}

impl PassError {
    /// Wraps a launch failure.
    pub fn launch(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Launch(Arc::new(err))
    }

    /// Wraps a wait failure.
    pub fn wait(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wait(Arc::new(err))
    }

    /// Wraps a termination failure.
    pub fn terminate(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Terminate(Arc::new(err))
    }
}
