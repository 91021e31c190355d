//! Authentication and throttling for tool calls.
//!
//! Core principle: **no call reaches the remote application without passing
//! the gate.** [`AuthGate::authorize`] checks, in order:
//!
//! 1. the shared secret (constant-time comparison),
//! 2. the client allow-list (empty = unrestricted),
//! 3. a fixed-window request quota per client.
//!
//! Each check fails closed with its own [`fault::ErrorKind`].

mod config;
mod credentials;
mod gate;
mod secret;

pub use config::{AuthConfig, MIN_SECRET_LEN, RateLimitConfig};
pub use credentials::{AuthContext, Credentials, DEFAULT_CLIENT_ID};
pub use gate::{AuthGate, RateLimitDecision};
pub use secret::{generate_secret, hash_for_logging};
