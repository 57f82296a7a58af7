//! Per-installation GitHub tracker construction.
//!
//! Installation access tokens expire, so a cached tracker is only reused
//! while its token has more than [`TOKEN_REFRESH_MARGIN`] left. A token
//! without an expiry keeps its tracker for the life of the factory.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;

use super::GitHubIssueTracker;
use crate::tasklist::{
    domain::InstallationContext,
    ports::{IssueTrackerError, IssueTrackerFactory, IssueTrackerResult},
};

/// Remaining lifetime below which a cached token is replaced.
pub const TOKEN_REFRESH_MARGIN: TimeDelta = TimeDelta::minutes(5);

/// Installation access token and the moment it stops being accepted.
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationToken {
    secret: String,
    expires_at: Option<DateTime<Utc>>,
}

impl InstallationToken {
    /// Wraps a token that expires at `expires_at`, or never when `None`.
    #[must_use]
    pub fn new(secret: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            secret: secret.into(),
            expires_at,
        }
    }

    /// Returns the token text.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns the expiry, if the token has one.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }
}

impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Supplies installation access tokens.
pub trait InstallationTokenProvider: Send + Sync {
    /// Returns a token acting for `installation`.
    ///
    /// # Errors
    ///
    /// Returns [`IssueTrackerError::Credentials`] when no token is available.
    fn token(&self, installation: InstallationContext) -> IssueTrackerResult<InstallationToken>;
}

/// Token provider returning one configured token for every installation.
///
/// The configured token carries no expiry.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Wraps a configured token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl InstallationTokenProvider for StaticTokenProvider {
    fn token(&self, installation: InstallationContext) -> IssueTrackerResult<InstallationToken> {
        if self.token.trim().is_empty() {
            return Err(IssueTrackerError::Credentials(
                installation.installation_id(),
            ));
        }
        Ok(InstallationToken::new(self.token.clone(), None))
    }
}

struct CachedTracker {
    tracker: Arc<GitHubIssueTracker>,
    expires_at: Option<DateTime<Utc>>,
}

impl CachedTracker {
    fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expires_at| {
            now.checked_add_signed(TOKEN_REFRESH_MARGIN)
                .is_some_and(|deadline| deadline < expires_at)
        })
    }
}

/// Builds one [`GitHubIssueTracker`] per installation and reuses it until
/// its token nears expiry.
pub struct GitHubTrackerFactory<P, C> {
    api_base: String,
    bot_login: String,
    request_timeout: Duration,
    tokens: P,
    clock: Arc<C>,
    clients: Mutex<HashMap<u64, CachedTracker>>,
}

impl<P, C> GitHubTrackerFactory<P, C>
where
    P: InstallationTokenProvider,
    C: Clock + Send + Sync,
{
    /// Creates a factory for the API at `api_base`.
    #[must_use]
    pub fn new(
        api_base: impl Into<String>,
        bot_login: impl Into<String>,
        request_timeout: Duration,
        tokens: P,
        clock: Arc<C>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            bot_login: bot_login.into(),
            request_timeout,
            tokens,
            clock,
            clients: Mutex::new(HashMap::new()),
        }
    }
}

impl<P, C> IssueTrackerFactory for GitHubTrackerFactory<P, C>
where
    P: InstallationTokenProvider,
    C: Clock + Send + Sync,
{
    type Tracker = GitHubIssueTracker;

    fn for_installation(
        &self,
        installation: InstallationContext,
    ) -> IssueTrackerResult<Arc<Self::Tracker>> {
        let mut clients = self
            .clients
            .lock()
            .map_err(|err| IssueTrackerError::transport(std::io::Error::other(err.to_string())))?;
        let id = installation.installation_id();
        if let Some(cached) = clients.get(&id) {
            if cached.is_usable_at(self.clock.utc()) {
                return Ok(Arc::clone(&cached.tracker));
            }
            tracing::debug!(installation = id, "installation token near expiry, refreshing");
        }
        let token = self.tokens.token(installation)?;
        let tracker = Arc::new(GitHubIssueTracker::new(
            &self.api_base,
            token.secret(),
            self.bot_login.clone(),
            self.request_timeout,
        )?);
        clients.insert(
            id,
            CachedTracker {
                tracker: Arc::clone(&tracker),
                expires_at: token.expires_at(),
            },
        );
        Ok(tracker)
    }
}
