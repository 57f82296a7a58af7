//! Pass launcher running passes as runtime tasks.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::tasklist::{
    domain::{ClaimToken, IssueRef},
    ports::{PassLauncher, PassOutcome, PassResult, RunningPass},
};

/// Launches passes on the current runtime and aborts them on termination.
///
/// Aborting only takes effect at an await point, so this launcher suits
/// tests and trusted in-process passes. Production uses the process
/// launcher.
pub struct InProcessPassLauncher<F> {
    pass: Arc<F>,
}

impl<F, Fut> InProcessPassLauncher<F>
where
    F: Fn(IssueRef, ClaimToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PassOutcome> + Send + 'static,
{
    /// Creates a launcher running `pass` for each launch.
    #[must_use]
    pub fn new(pass: F) -> Self {
        Self {
            pass: Arc::new(pass),
        }
    }
}

/// Handle to a pass started by [`InProcessPassLauncher`].
#[derive(Debug)]
pub struct InProcessPass {
    handle: JoinHandle<PassOutcome>,
}

#[async_trait]
impl<F, Fut> PassLauncher for InProcessPassLauncher<F>
where
    F: Fn(IssueRef, ClaimToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = PassOutcome> + Send + 'static,
{
    type Pass = InProcessPass;

    async fn launch(&self, issue_ref: &IssueRef, claim: ClaimToken) -> PassResult<Self::Pass> {
        let pass = Arc::clone(&self.pass);
        let target = issue_ref.clone();
        let handle = tokio::spawn(async move { pass(target, claim).await });
        Ok(InProcessPass { handle })
    }
}

#[async_trait]
impl RunningPass for InProcessPass {
    async fn wait(&mut self) -> PassResult<PassOutcome> {
        Ok((&mut self.handle)
            .await
            .unwrap_or_else(|err| PassOutcome::Failed(err.to_string())))
    }

    async fn terminate(&mut self) -> PassResult<()> {
        self.handle.abort();
        Ok(())
    }
}
