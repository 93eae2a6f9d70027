//! Per-run user context.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::auth::{AuthError, CredentialStore};
use crate::dataset::DatasetCache;

/// An authenticated user plus the dataset parses memoized for this session.
#[derive(Debug)]
pub struct Session {
    username: String,
    logged_in_at: DateTime<Utc>,
    cache: DatasetCache,
}

impl Session {
    /// Verifies credentials against `store` and opens a session.
    pub fn login<S: CredentialStore + ?Sized>(store: &S, username: &str, password: &str) -> Result<Self, AuthError> {
        if !store.authenticate(username, password)? {
            warn!(username, "Login failed");
            return Err(AuthError::InvalidCredentials);
        }
        info!(username, "Welcome back, {username}!");
        Ok(Self {
            username: username.to_string(),
            logged_in_at: Utc::now(),
            cache: DatasetCache::new(),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DatasetCache {
        &mut self.cache
    }

    /// Ends the session, discarding memoized datasets.
    pub fn logout(self) {
        let minutes = (Utc::now() - self.logged_in_at).num_minutes();
        info!(
            username = %self.username,
            cached_datasets = self.cache.len(),
            session_minutes = minutes,
            "Logged out"
        );
    }
}
