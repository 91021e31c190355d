//! MCP server loop over a newline-delimited JSON-RPC stream.

use std::future::Future;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, Tool,
};

/// Maximum size of one inbound message (1MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// The tools exposed by a [`Server`].
pub trait ToolProvider: Send + Sync + 'static {
    fn list_tools(&self) -> Vec<Tool>;

    /// Run one tool. Failures are reported in the result, not as an `Err`.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = CallToolResult> + Send;
}

/// MCP server answering requests from one client stream.
pub struct Server<P> {
    provider: Arc<P>,
    info: Implementation,
}

impl<P: ToolProvider> Server<P> {
    pub fn new(provider: Arc<P>, info: Implementation) -> Self {
        Self { provider, info }
    }

    /// Serve requests until EOF or cancellation.
    ///
    /// `tools/call` requests run concurrently, so their responses may be
    /// written in a different order than the requests arrived. On EOF the
    /// calls still running are awaited; on cancellation they are aborted.
    pub async fn serve<R, W>(&self, reader: R, writer: W, cancel: CancellationToken) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (responses, outbox) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_loop(writer, outbox));
        let mut calls = JoinSet::new();
        let mut lines = reader.lines();

        loop {
            let line = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("shutdown requested, aborting in-flight calls");
                    calls.abort_all();
                    break;
                }
                line = lines.next_line() => line?,
            };
            let Some(line) = line else {
                debug!("input closed");
                break;
            };
            while calls.try_join_next().is_some() {}

            if let Some(response) = self.handle_line(&line, &mut calls, &responses) {
                responses.send(response).map_err(|_| Error::WriterStopped)?;
            }
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Err(e) if e.is_panic() => warn!(error = %e, "tool call panicked"),
                _ => {}
            }
        }
        drop(responses);
        writer_task.await.map_err(|_| Error::WriterStopped)?
    }

    /// Handle one inbound line. Returns the immediate response, if any;
    /// tool calls answer later through `responses`.
    fn handle_line(
        &self,
        line: &str,
        calls: &mut JoinSet<()>,
        responses: &mpsc::UnboundedSender<JsonRpcResponse>,
    ) -> Option<JsonRpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.len() > MAX_MESSAGE_SIZE {
            warn!(size = line.len(), max = MAX_MESSAGE_SIZE, "message too large");
            return Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::invalid_request(format!(
                    "message of {} bytes exceeds {MAX_MESSAGE_SIZE}",
                    line.len()
                )),
            ));
        }

        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => return Some(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e))),
        };
        let request: JsonRpcRequest = match serde_json::from_value(raw.clone()) {
            Ok(request) => request,
            Err(e) => {
                let id = raw.get("id").cloned().and_then(|id| serde_json::from_value(id).ok());
                return Some(JsonRpcResponse::failure(id, JsonRpcError::invalid_request(e)));
            }
        };

        let Some(id) = request.id.clone() else {
            debug!(method = %request.method, "notification");
            return None;
        };
        debug!(method = %request.method, ?id, "request");

        match request.method.as_str() {
            "initialize" => Some(JsonRpcResponse::success(id, self.initialize())),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Some(JsonRpcResponse::success(
                id,
                ListToolsResult {
                    tools: self.provider.list_tools(),
                },
            )),
            "tools/call" => {
                let params: CallToolParams =
                    match serde_json::from_value(request.params.unwrap_or(Value::Null)) {
                        Ok(params) => params,
                        Err(e) => {
                            return Some(JsonRpcResponse::failure(
                                Some(id),
                                JsonRpcError::invalid_params(e),
                            ));
                        }
                    };
                self.spawn_call(id, params, calls, responses.clone());
                None
            }
            other => Some(JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::method_not_found(other),
            )),
        }
    }

    fn initialize(&self) -> InitializeResult {
        info!(server = %self.info.name, version = %self.info.version, "client initialized");
        InitializeResult {
            protocol_version: PROTOCOL_VERSION,
            capabilities: ServerCapabilities::default(),
            server_info: self.info.clone(),
        }
    }

    fn spawn_call(
        &self,
        id: RequestId,
        params: CallToolParams,
        calls: &mut JoinSet<()>,
        responses: mpsc::UnboundedSender<JsonRpcResponse>,
    ) {
        let provider = Arc::clone(&self.provider);
        calls.spawn(async move {
            let arguments = params.arguments.unwrap_or_default();
            let result = provider.call_tool(&params.name, arguments).await;
            // The writer only goes away once serving has stopped.
            let _ = responses.send(JsonRpcResponse::success(id, result));
        });
    }
}

async fn write_loop<W>(mut writer: W, mut outbox: mpsc::UnboundedReceiver<JsonRpcResponse>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = outbox.recv().await {
        let mut payload = serde_json::to_vec(&response)?;
        payload.push(b'\n');
        writer.write_all(&payload).await?;
        writer.flush().await?;
    }
    Ok(())
}
