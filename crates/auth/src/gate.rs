//! Auth gate: secret check, client allow-list and per-client quota.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use fault::{Error, ErrorCode, Result};
use secrecy::ExposeSecret;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::secret::{constant_time_eq, digest, hash_for_logging};
use crate::{AuthConfig, AuthContext, Credentials};

/// Result of a quota check. `remaining` is only set when the call is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: Option<u32>,
}

impl RateLimitDecision {
    fn allow(remaining: u32) -> Self {
        Self {
            allowed: true,
            remaining: Some(remaining),
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            remaining: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    reset_at: Instant,
}

/// Single enforcement point for credentials and quotas.
///
/// The rate-limit store lives as long as the gate; expired windows are
/// replaced lazily on the client's next call.
#[derive(Debug)]
pub struct AuthGate {
    config: AuthConfig,
    secret_digest: [u8; 32],
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl AuthGate {
    pub fn new(config: AuthConfig) -> Self {
        let secret_digest = digest(config.shared_secret.expose_secret().as_bytes());
        Self {
            config,
            secret_digest,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Constant-time check of a presented secret.
    pub fn validate_secret(&self, provided: &str) -> bool {
        constant_time_eq(provided.as_bytes(), &self.secret_digest)
    }

    /// Allow-list membership; an empty allow-list admits everyone.
    pub fn validate_client(&self, client_id: Option<&str>) -> bool {
        if self.config.allowed_clients.is_empty() {
            return true;
        }
        client_id.is_some_and(|id| self.config.allowed_clients.contains(id))
    }

    /// Count one request against `client_id`'s fixed window.
    pub fn check_rate_limit(&self, client_id: &str) -> RateLimitDecision {
        let limit = self.config.rate_limit;
        let now = Instant::now();
        let mut windows = self.windows();

        match windows.get_mut(client_id) {
            Some(window) if now < window.reset_at => {
                if window.count >= limit.max_requests {
                    return RateLimitDecision::deny();
                }
                window.count += 1;
                RateLimitDecision::allow(limit.max_requests - window.count)
            }
            _ => {
                windows.insert(
                    client_id.to_string(),
                    RateLimitWindow {
                        count: 1,
                        reset_at: now + limit.window(),
                    },
                );
                RateLimitDecision::allow(limit.max_requests.saturating_sub(1))
            }
        }
    }

    /// Middleware: secret, then allow-list, then quota. Fails closed at the
    /// first check that does not pass.
    pub fn authorize(&self, credentials: &Credentials) -> Result<AuthContext> {
        let secret = match credentials.api_key.as_deref() {
            Some(secret) if self.validate_secret(secret) => secret,
            _ => {
                warn!(client_id = ?credentials.client_id, "rejected call: invalid API key");
                return Err(Error::authentication("Invalid API key", ErrorCode::InvalidApiKey));
            }
        };

        if !self.validate_client(credentials.client_id.as_deref()) {
            warn!(client_id = ?credentials.client_id, "rejected call: unauthorized client");
            return Err(
                Error::authentication("Unauthorized client", ErrorCode::UnauthorizedClient)
                    .with_context("clientId", &credentials.client_id),
            );
        }

        let client_id = credentials.rate_limit_key();
        let decision = self.check_rate_limit(client_id);
        let remaining = match decision.remaining {
            Some(remaining) if decision.allowed => remaining,
            _ => {
                warn!(client_id, "rejected call: rate limit exceeded");
                let limit = self.config.rate_limit;
                return Err(Error::rate_limited(limit.max_requests, limit.window_ms, 0)
                    .with_context("clientId", client_id));
            }
        };

        info!(
            client_id,
            key_hash = %hash_for_logging(secret),
            remaining,
            "call authorized"
        );

        Ok(AuthContext {
            client_id: client_id.to_string(),
            remaining_requests: remaining,
        })
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RateLimitConfig;
    use fault::ErrorKind;
    use std::time::Duration;

    const SECRET: &str = "test-api-key-that-is-at-least-32-characters-long";

    fn gate() -> AuthGate {
        AuthGate::new(
            AuthConfig::new(SECRET)
                .with_allowed_clients(["client1", "client2"])
                .with_rate_limit(RateLimitConfig::new(5, Duration::from_secs(1))),
        )
    }

    #[test]
    fn validates_exact_secret_only() {
        let gate = gate();
        assert!(gate.validate_secret(SECRET));
        assert!(!gate.validate_secret("wrong-key"));
        assert!(!gate.validate_secret(&SECRET[..SECRET.len() - 1]));
        assert!(!gate.validate_secret(&format!("{SECRET}x")));
    }

    #[test]
    fn validates_allowed_clients() {
        let gate = gate();
        assert!(gate.validate_client(Some("client1")));
        assert!(gate.validate_client(Some("client2")));
        assert!(!gate.validate_client(Some("client3")));
        assert!(!gate.validate_client(None));
    }

    #[test]
    fn empty_allow_list_admits_anyone() {
        let gate = AuthGate::new(AuthConfig::new(SECRET));
        assert!(gate.validate_client(Some("any-client")));
        assert!(gate.validate_client(None));
    }

    #[tokio::test(start_paused = true)]
    async fn quota_counts_down_then_denies() {
        let gate = gate();
        for expected in (0..5).rev() {
            let decision = gate.check_rate_limit("test-client");
            assert!(decision.allowed);
            assert_eq!(decision.remaining, Some(expected));
        }
        let decision = gate.check_rate_limit("test-client");
        assert_eq!(decision, RateLimitDecision { allowed: false, remaining: None });
    }

    #[tokio::test(start_paused = true)]
    async fn quota_resets_after_window() {
        let gate = gate();
        for _ in 0..6 {
            gate.check_rate_limit("test-client");
        }
        tokio::time::advance(Duration::from_millis(1100)).await;

        let decision = gate.check_rate_limit("test-client");
        assert_eq!(decision, RateLimitDecision { allowed: true, remaining: Some(4) });
    }

    #[tokio::test(start_paused = true)]
    async fn quotas_are_per_client() {
        let gate = gate();
        for _ in 0..5 {
            gate.check_rate_limit("a");
        }
        assert!(!gate.check_rate_limit("a").allowed);
        assert_eq!(gate.check_rate_limit("b").remaining, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_accepts_valid_call() {
        let gate = gate();
        let context = gate
            .authorize(&Credentials::new(SECRET).with_client("client1"))
            .unwrap();
        assert_eq!(context.client_id, "client1");
        assert_eq!(context.remaining_requests, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_rejects_bad_or_missing_secret() {
        let gate = gate();
        let err = gate
            .authorize(&Credentials::new("wrong-key").with_client("client1"))
            .unwrap_err();
        assert_eq!(err.message(), "Invalid API key");
        assert_eq!(err.code(), ErrorCode::InvalidApiKey);

        let err = gate
            .authorize(&Credentials::anonymous().with_client("client1"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidApiKey);
    }

    #[tokio::test(start_paused = true)]
    async fn authorize_rejects_unknown_client() {
        let gate = AuthGate::new(AuthConfig::new(SECRET).with_allowed_clients(["client1"]));
        let err = gate
            .authorize(&Credentials::new(SECRET).with_client("client2"))
            .unwrap_err();
        assert_eq!(err.message(), "Unauthorized client");
        assert_eq!(
            err.kind(),
            &ErrorKind::AuthenticationFailed {
                code: ErrorCode::UnauthorizedClient
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_secret_does_not_consume_quota() {
        let gate = gate();
        for _ in 0..10 {
            let _ = gate.authorize(&Credentials::new("wrong-key").with_client("client1"));
        }
        let context = gate
            .authorize(&Credentials::new(SECRET).with_client("client1"))
            .unwrap();
        assert_eq!(context.remaining_requests, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn scenario_five_calls_then_throttled_then_reset() {
        let secret = "k".repeat(32);
        let gate = AuthGate::new(
            AuthConfig::new(secret.clone())
                .with_allowed_clients(["c1"])
                .with_rate_limit(RateLimitConfig::new(5, Duration::from_millis(1000))),
        );
        let credentials = Credentials::new(secret).with_client("c1");

        let remaining: Vec<u32> = (0..5)
            .map(|_| gate.authorize(&credentials).unwrap().remaining_requests)
            .collect();
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let err = gate.authorize(&credentials).unwrap_err();
        assert!(err.message().contains("Rate limit exceeded"));
        assert_eq!(
            err.kind(),
            &ErrorKind::RateLimitExceeded {
                limit: 5,
                window_ms: 1000,
                remaining: 0
            }
        );

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(gate.authorize(&credentials).unwrap().remaining_requests, 4);
    }
}
