//! MCP error types.

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("stdio failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("response writer stopped unexpectedly")]
    WriterStopped,
}

pub type Result<T> = std::result::Result<T, Error>;
