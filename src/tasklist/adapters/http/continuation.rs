//! Continuation trigger calling the service's own HTTP endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::tasklist::{domain::IssueRef, ports::ContinuationTrigger};

/// Body of a `POST /process-tasklist` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationRequest {
    /// Job to continue, as `owner/repo#number`.
    pub issue_ref: String,
}

/// Fires `POST /process-tasklist` without waiting for the response.
#[derive(Debug, Clone)]
pub struct HttpContinuationTrigger {
    client: Client,
    endpoint: String,
}

impl HttpContinuationTrigger {
    /// Creates a trigger posting to `{public_url}/process-tasklist`.
    #[must_use]
    pub fn new(client: Client, public_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/process-tasklist", public_url.trim_end_matches('/')),
        }
    }

    /// Returns the URL requests are sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ContinuationTrigger for HttpContinuationTrigger {
    fn trigger(&self, issue_ref: &IssueRef) {
        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(issue_ref = %issue_ref, "no runtime available for continuation");
            return;
        };
        let request = self.client.post(&self.endpoint).json(&ContinuationRequest {
            issue_ref: issue_ref.to_string(),
        });
        let target = issue_ref.clone();
        handle.spawn(async move {
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(issue_ref = %target, "continuation delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        issue_ref = %target,
                        status = response.status().as_u16(),
                        "continuation rejected"
                    );
                }
                Err(err) => {
                    tracing::warn!(issue_ref = %target, error = %err, "continuation failed");
                }
            }
        });
    }
}
