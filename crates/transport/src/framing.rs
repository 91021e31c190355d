//! Message framing over the byte stream.
//!
//! Every complete JSON value at the head of the receive buffer is one
//! message. Values may arrive split across reads or several per read, with or
//! without a trailing newline.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Largest receive buffer kept while waiting for a message to complete.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// How outbound messages are delimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// One JSON value followed by `\n`.
    #[default]
    Ndjson,
    /// Bare JSON values, no delimiter.
    Raw,
}

impl Framing {
    pub fn delimiter(self) -> &'static [u8] {
        match self {
            Self::Ndjson => b"\n",
            Self::Raw => b"",
        }
    }
}

/// Bytes dropped by the decoder.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("discarded {discarded} bytes of invalid JSON: {source}")]
    Invalid {
        discarded: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("discarded {size} buffered bytes without a complete message (max {max})")]
    Oversized { size: usize, max: usize },
}

/// Incremental decoder owning the receive buffer.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Append a chunk read from the socket.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Bytes buffered but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete message, if any.
    ///
    /// `Ok(None)` means more data is needed. On error the offending bytes
    /// have already been dropped and decoding can continue.
    pub fn next_frame(&mut self) -> Result<Option<Value>, FrameError> {
        let Some(start) = self.buffer.iter().position(|b| !b.is_ascii_whitespace()) else {
            self.buffer.clear();
            return Ok(None);
        };

        let decoded = {
            let mut stream =
                serde_json::Deserializer::from_slice(&self.buffer[start..]).into_iter::<Value>();
            match stream.next() {
                Some(Ok(value)) => Ok(Some((value, start + stream.byte_offset()))),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        };

        match decoded {
            Ok(Some((value, consumed))) => {
                self.buffer.drain(..consumed);
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_eof() => {
                if self.buffer.len() > self.max_frame_bytes {
                    let size = self.buffer.len();
                    self.buffer.clear();
                    return Err(FrameError::Oversized {
                        size,
                        max: self.max_frame_bytes,
                    });
                }
                Ok(None)
            }
            Err(source) => {
                let discarded = self.discard_line(start);
                Err(FrameError::Invalid { discarded, source })
            }
        }
    }

    /// Drop everything up to and including the first newline after `start`,
    /// or the whole buffer when there is none.
    fn discard_line(&mut self, start: usize) -> usize {
        let end = self.buffer[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.buffer.len(), |offset| start + offset + 1);
        self.buffer.drain(..end);
        end
    }
}
