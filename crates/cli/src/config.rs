//! Configuration loading from revit-mcp.toml.

use std::path::Path;
use std::time::Duration;

use auth::AuthConfig;
use fault::BreakerConfig;
use secrecy::SecretString;
use serde::Deserialize;
use transport::{
    ConnectionConfig, DEFAULT_MAX_FRAME_BYTES, Framing, LifecyclePolicy, ManagerConfig,
};

use crate::error::{Error, Result};

/// File read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "revit-mcp.toml";

const ENV_HOST: &str = "REVIT_HOST";
const ENV_PORT: &str = "REVIT_PORT";
const ENV_API_KEY: &str = "REVIT_MCP_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Where the Revit plugin listens.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Absent means calls are not authenticated.
    pub auth: Option<AuthConfig>,

    #[serde(default)]
    pub breaker: BreakerSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[remote]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub lifecycle: LifecyclePolicy,
    pub framing: Framing,
    pub max_frame_bytes: usize,
    pub reconnect_attempts: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            connect_timeout_ms: 5_000,
            request_timeout_ms: 120_000,
            lifecycle: LifecyclePolicy::default(),
            framing: Framing::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            reconnect_attempts: 3,
        }
    }
}

/// `[breaker]`
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct BreakerSection {
    pub threshold: u32,
    pub timeout_ms: u64,
    pub reset_timeout_ms: u64,
}

impl Default for BreakerSection {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout_ms: 130_000,
            reset_timeout_ms: 30_000,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter directive; `RUST_LOG` wins over it.
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Config {
    /// Load `path`, or `revit-mcp.toml` if present, then apply environment
    /// overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::read(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Apply `REVIT_HOST`, `REVIT_PORT` and `REVIT_MCP_API_KEY`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = var(ENV_HOST).filter(|h| !h.is_empty()) {
            self.remote.host = host;
        }
        if let Some(port) = var(ENV_PORT) {
            self.remote.port = port.trim().parse().map_err(|_| {
                fault::Error::configuration(
                    format!("{ENV_PORT} must be a port number, got '{port}'"),
                    "remote.port",
                )
            })?;
        }
        if let Some(secret) = var(ENV_API_KEY).filter(|s| !s.is_empty()) {
            match self.auth.as_mut() {
                Some(auth) => auth.shared_secret = SecretString::from(secret),
                None => self.auth = Some(AuthConfig::new(secret)),
            }
        }
        Ok(())
    }

    /// Reject settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("remote.port", u64::from(self.remote.port)),
            ("remote.connect_timeout_ms", self.remote.connect_timeout_ms),
            ("remote.request_timeout_ms", self.remote.request_timeout_ms),
            ("breaker.threshold", u64::from(self.breaker.threshold)),
            ("breaker.timeout_ms", self.breaker.timeout_ms),
            ("breaker.reset_timeout_ms", self.breaker.reset_timeout_ms),
        ];
        if let Some((key, _)) = required.iter().find(|(_, value)| *value == 0) {
            return Err(fault::Error::configuration(format!("{key} must be non-zero"), *key).into());
        }
        if let Some(auth) = &self.auth {
            auth.validate()?;
        }
        Ok(())
    }

    pub fn manager_config(&self) -> ManagerConfig {
        let remote = &self.remote;
        let mut connection = ConnectionConfig::new(remote.host.clone(), remote.port);
        connection.connect_timeout = Duration::from_millis(remote.connect_timeout_ms);
        connection.request_timeout = Duration::from_millis(remote.request_timeout_ms);
        connection.framing = remote.framing;
        connection.max_frame_bytes = remote.max_frame_bytes;

        ManagerConfig {
            connection,
            lifecycle: remote.lifecycle,
            reconnect_attempts: remote.reconnect_attempts,
            ..ManagerConfig::default()
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            threshold: self.breaker.threshold,
            timeout: Duration::from_millis(self.breaker.timeout_ms),
            reset_timeout: Duration::from_millis(self.breaker.reset_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault::ErrorKind;
    use secrecy::ExposeSecret;

    const SECRET: &str = "test-api-key-that-is-at-least-32-characters-long";

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.remote.host, "localhost");
        assert_eq!(config.remote.port, 8080);
        assert_eq!(config.remote.lifecycle, LifecyclePolicy::Ephemeral);
        assert_eq!(config.remote.framing, Framing::Ndjson);
        assert!(config.auth.is_none());
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.breaker_config(), BreakerConfig::default());

        let manager = config.manager_config();
        assert_eq!(manager.connection.address(), "localhost:8080");
        assert_eq!(manager.connection.connect_timeout, Duration::from_secs(5));
        assert_eq!(manager.connection.request_timeout, Duration::from_secs(120));
        assert_eq!(manager.reconnect_attempts, 3);
    }

    #[test]
    fn parse_full_file() {
        let config = Config::parse(&format!(
            r#"
[remote]
host = "10.0.0.5"
port = 9000
lifecycle = "persistent"
framing = "raw"
request_timeout_ms = 1000

[auth]
shared_secret = "{SECRET}"
allowed_clients = ["claude"]

[auth.rate_limit]
max_requests = 10
window_ms = 1000

[breaker]
threshold = 2

[logging]
filter = "debug"
format = "json"
"#
        ))
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.remote.lifecycle, LifecyclePolicy::Persistent);
        assert_eq!(config.remote.framing, Framing::Raw);
        assert_eq!(config.manager_config().connection.request_timeout, Duration::from_secs(1));
        let auth = config.auth.as_ref().unwrap();
        assert!(auth.allowed_clients.contains("claude"));
        assert_eq!(auth.rate_limit.max_requests, 10);
        assert_eq!(config.breaker_config().threshold, 2);
        assert_eq!(config.breaker_config().reset_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn env_overrides_file() {
        let mut config = Config::parse("[remote]\nhost = \"file-host\"\n").unwrap();
        config
            .apply_env(|key| match key {
                ENV_HOST => Some("env-host".into()),
                ENV_PORT => Some("9100".into()),
                ENV_API_KEY => Some(SECRET.into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.remote.host, "env-host");
        assert_eq!(config.remote.port, 9100);
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.shared_secret.expose_secret(), SECRET);
        config.validate().unwrap();
    }

    #[test]
    fn env_secret_replaces_file_secret() {
        let mut config = Config::parse(&format!(
            "[auth]\nshared_secret = \"{SECRET}\"\nallowed_clients = [\"c1\"]\n"
        ))
        .unwrap();
        let replacement = "z".repeat(40);
        let env_secret = replacement.clone();
        config
            .apply_env(move |key| (key == ENV_API_KEY).then(|| env_secret.clone()))
            .unwrap();
        let auth = config.auth.as_ref().unwrap();
        assert_eq!(auth.shared_secret.expose_secret(), replacement);
        assert!(auth.allowed_clients.contains("c1"));
    }

    #[test]
    fn bad_port_env_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == ENV_PORT).then(|| "http".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("REVIT_PORT"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut config = Config::default();
        config.apply_env(|key| (key == ENV_API_KEY).then(|| "short".to_string())).unwrap();
        match config.validate().unwrap_err() {
            Error::Bridge(e) => assert!(
                matches!(e.kind(), ErrorKind::ConfigurationError { key } if key == "auth.shared_secret")
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = Config::parse("[remote]\nport = 0\n").unwrap();
        config.apply_env(no_env).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeouts_and_threshold_are_rejected() {
        for (section, key) in [
            ("remote", "connect_timeout_ms"),
            ("remote", "request_timeout_ms"),
            ("breaker", "threshold"),
            ("breaker", "timeout_ms"),
            ("breaker", "reset_timeout_ms"),
        ] {
            let config = Config::parse(&format!("[{section}]\n{key} = 0\n")).unwrap();
            let expected = format!("{section}.{key}");
            match config.validate().unwrap_err() {
                Error::Bridge(e) => {
                    assert!(
                        matches!(e.kind(), ErrorKind::ConfigurationError { key } if *key == expected),
                        "{e}"
                    );
                    assert!(e.message().contains("must be non-zero"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
        Config::default().validate().unwrap();
    }

    #[test]
    fn unknown_lifecycle_fails_to_parse() {
        assert!(Config::parse("[remote]\nlifecycle = \"forever\"\n").is_err());
    }
}
