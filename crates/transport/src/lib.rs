//! TCP transport to the remote CAD application.
//!
//! A [`Connection`] owns one socket, the receive buffer and the table of
//! pending calls. A [`ConnectionManager`] decides whether each call gets a
//! fresh connection or shares a persistent one.
//!
//! # Example
//!
//! ```no_run
//! use transport::{ConnectionConfig, ConnectionManager, LifecyclePolicy, ManagerConfig};
//!
//! # async fn example() -> fault::Result<()> {
//! let manager = ConnectionManager::new(ManagerConfig {
//!     connection: ConnectionConfig::new("localhost", 8080),
//!     lifecycle: LifecyclePolicy::Persistent,
//!     ..ManagerConfig::default()
//! });
//!
//! let view = manager
//!     .with_connection(|conn| async move {
//!         conn.send("get_current_view_info", serde_json::json!({})).await
//!     })
//!     .await?;
//! println!("{view}");
//!
//! manager.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod connection;
mod framing;
mod manager;
mod protocol;

#[cfg(test)]
mod testing;

pub use connection::{
    Connection, ConnectionConfig, ConnectionState, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT,
};
pub use framing::{DEFAULT_MAX_FRAME_BYTES, FrameDecoder, FrameError, Framing};
pub use manager::{ConnectionManager, LifecyclePolicy, ManagerConfig};
pub use protocol::{
    DEFAULT_RESPONSE_ID, PROTOCOL_VERSION, RemoteError, Request, Response, ResponseId,
    UNKNOWN_REMOTE_ERROR,
};
