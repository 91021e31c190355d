//! CAD tools exposed to the agent.
//!
//! Each tool validates its arguments against a declared parameter list and
//! turns them into one command for the remote application. The
//! [`Dispatcher`] runs a call end to end: credentials, validation, a
//! per-method circuit breaker and the connection manager.
//!
//! # Example
//!
//! ```no_run
//! use tools::{Dispatcher, ToolRegistry};
//! use transport::{ConnectionManager, ManagerConfig};
//!
//! # async fn example() -> fault::Result<()> {
//! let dispatcher = Dispatcher::new(
//!     ToolRegistry::with_builtin()?,
//!     ConnectionManager::new(ManagerConfig::default()),
//! );
//! let text = dispatcher
//!     .dispatch("get_current_view_info", serde_json::Map::new())
//!     .await?;
//! println!("{text}");
//! # Ok(())
//! # }
//! ```

mod catalog;
mod dispatch;
mod handler;
mod params;
mod registry;
mod secure_code;

pub use catalog::builtin;
pub use dispatch::Dispatcher;
pub use handler::{Forward, RemoteCall, RemoteTool, ToolHandler, pretty};
pub use params::{ParamSpec, ParamType, object_schema, validate};
pub use registry::ToolRegistry;
pub use secure_code::{CodeScreen, MAX_CODE_LEN, SecureCodeTool};
