//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The config file named on the command line could not be read.
    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML or has the wrong shape.
    #[error("failed to parse config: {0}")]
    ParseConfig(#[from] toml::de::Error),

    /// Invalid configuration values, or a failed tool call.
    #[error(transparent)]
    Bridge(#[from] fault::Error),

    /// `--args` is not a JSON object.
    #[error("invalid tool arguments: {0}")]
    InvalidArguments(String),

    /// Logging could not be initialised.
    #[error("failed to initialise logging: {0}")]
    Logging(String),

    /// An error occurred while serving the MCP stream.
    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
