//! MCP (Model Context Protocol) server library.
//!
//! This crate serves tools to an MCP client over a newline-delimited
//! JSON-RPC stream, usually the process's stdin and stdout.
//!
//! # Example
//!
//! ```no_run
//! use std::future::Future;
//! use std::sync::Arc;
//!
//! use mcp::{CallToolResult, Implementation, Server, Tool, ToolProvider};
//! use serde_json::{Map, Value};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Hello;
//!
//! impl ToolProvider for Hello {
//!     fn list_tools(&self) -> Vec<Tool> {
//!         vec![Tool {
//!             name: "hello".into(),
//!             description: None,
//!             input_schema: serde_json::json!({"type": "object"}),
//!         }]
//!     }
//!
//!     fn call_tool(
//!         &self,
//!         _name: &str,
//!         _arguments: Map<String, Value>,
//!     ) -> impl Future<Output = CallToolResult> + Send {
//!         async { CallToolResult::text("hi") }
//!     }
//! }
//!
//! # async fn example() -> mcp::Result<()> {
//! let server = Server::new(Arc::new(Hello), Implementation::new("hello", "0.1.0"));
//! let stdin = tokio::io::BufReader::new(tokio::io::stdin());
//! server.serve(stdin, tokio::io::stdout(), CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod protocol;
mod server;

pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, Tool, ToolContent, ToolsCapability,
};
pub use server::{MAX_MESSAGE_SIZE, Server, ToolProvider};
