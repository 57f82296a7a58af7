//! GitHub adapters for the issue-tracker port.

mod client;
mod factory;

pub use client::GitHubIssueTracker;
pub use factory::{
    GitHubTrackerFactory, InstallationToken, InstallationTokenProvider, StaticTokenProvider,
    TOKEN_REFRESH_MARGIN,
};
