//! HTTP adapters: the self-addressed continuation trigger and webhook
//! decoding.

mod continuation;
mod webhook;

pub use continuation::{ContinuationRequest, HttpContinuationTrigger};
pub use webhook::{WebhookError, parse_issue_event};
