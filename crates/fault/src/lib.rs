//! Error taxonomy and failure isolation for the CAD bridge.
//!
//! Every failure on the request path is an [`Error`]: a matchable
//! [`ErrorKind`], a stable [`ErrorCode`], optional structured context and a
//! timestamp. Errors convert to the uniform [`ErrorResponse`] envelope
//! (`{error: {code, message, data}}`) before they reach the end caller.
//!
//! [`CircuitBreaker`] wraps one remote operation and stops calling it while
//! it keeps failing.
//!
//! # Example
//!
//! ```no_run
//! use fault::{BreakerConfig, CircuitBreaker, Error};
//!
//! # async fn example() -> fault::Result<()> {
//! let breaker = CircuitBreaker::new("get_current_view_info", BreakerConfig::default());
//! let value = breaker
//!     .call(|| async { Err::<(), _>(Error::connection_failed("refused")) })
//!     .await;
//! assert!(value.is_err());
//! # Ok(())
//! # }
//! ```

mod breaker;
mod code;
mod error;
mod wrap;

pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use code::ErrorCode;
pub use error::{BoxError, Error, ErrorBody, ErrorKind, ErrorResponse, Result};
pub use wrap::{wrap_async, wrap_async_with};
