//! Auth gate configuration.

use std::collections::HashSet;
use std::time::Duration;

use fault::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Shortest shared secret accepted at load time.
pub const MIN_SECRET_LEN: usize = 32;

/// Fixed-window request quota applied per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_ms() -> u64 {
    60_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Immutable auth settings: shared secret, client allow-list and quota.
///
/// An empty `allowed_clients` set means no client restriction.
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    #[serde(deserialize_with = "deserialize_secret")]
    pub shared_secret: SecretString,

    #[serde(default)]
    pub allowed_clients: HashSet<String>,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

fn deserialize_secret<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

impl AuthConfig {
    pub fn new(shared_secret: impl Into<String>) -> Self {
        Self {
            shared_secret: SecretString::from(shared_secret.into()),
            allowed_clients: HashSet::new(),
            rate_limit: RateLimitConfig::default(),
        }
    }

    pub fn with_allowed_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_clients = clients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Reject settings the gate cannot enforce.
    pub fn validate(&self) -> Result<()> {
        if self.shared_secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(Error::configuration(
                format!("shared secret must be at least {MIN_SECRET_LEN} characters"),
                "auth.shared_secret",
            ));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(Error::configuration(
                "rate limit max_requests must be greater than zero",
                "auth.rate_limit.max_requests",
            ));
        }
        if self.rate_limit.window_ms == 0 {
            return Err(Error::configuration(
                "rate limit window_ms must be greater than zero",
                "auth.rate_limit.window_ms",
            ));
        }
        Ok(())
    }
}
