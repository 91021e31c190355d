//! One TCP connection to the remote application.
//!
//! Calls are multiplexed over the socket by id. Each `send` registers a
//! pending call, writes its request and waits for the reader task to route
//! the matching response back, so responses may arrive in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fault::{Error, Result};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::framing::{DEFAULT_MAX_FRAME_BYTES, FrameDecoder, Framing};
use crate::protocol::{Request, Response, raw_routing_key};

/// Default time allowed for establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time a call waits for its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const READ_CHUNK: usize = 8 * 1024;

/// Where and how to reach the remote application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub framing: Framing,
    pub max_frame_bytes: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            framing: Framing::default(),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Socket state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// An outstanding call awaiting its response.
#[derive(Debug)]
struct PendingCall {
    method: String,
    created_at: Instant,
    reply: oneshot::Sender<Result<Value>>,
}

#[derive(Debug)]
struct Status {
    state: ConnectionState,
    /// Bumped on every successful connect so a stale reader cannot mark a
    /// newer socket disconnected.
    generation: u64,
}

/// State shared with the reader task.
#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
    pending: Mutex<HashMap<String, PendingCall>>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: ConnectionState) {
        self.status().state = state;
    }

    fn mark_disconnected(&self, generation: u64) {
        let mut status = self.status();
        if status.generation == generation {
            status.state = ConnectionState::Disconnected;
        }
    }

    /// Route one decoded frame to its pending call; unmatched frames are dropped.
    fn dispatch(&self, frame: Value) {
        let (key, outcome) = match serde_json::from_value::<Response>(frame.clone()) {
            Ok(response) => (response.routing_key(), response.into_result()),
            Err(e) => {
                let Some(key) = raw_routing_key(&frame) else {
                    warn!(error = %e, "dropping unroutable message");
                    return;
                };
                let err = Error::malformed_response(format!("Failed to parse response: {e}"));
                (key, Err(err))
            }
        };

        let Some(call) = self.pending().remove(&key) else {
            debug!(id = %key, "no pending call for response, dropping");
            return;
        };
        debug!(
            id = %key,
            method = %call.method,
            elapsed_ms = call.created_at.elapsed().as_millis() as u64,
            ok = outcome.is_ok(),
            "response received"
        );
        // The caller may have given up already.
        let _ = call.reply.send(outcome);
    }
}

/// Removes a pending call when its `send` finishes or is dropped.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: &'a str,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.pending().remove(self.id);
    }
}

/// Tears the socket down when a write is cancelled part way through.
///
/// A half-written frame leaves the stream unusable, so the write half is
/// dropped and the connection marked disconnected.
struct WriteInFlight<'a> {
    conn: &'a Connection,
    finished: bool,
}

impl Drop for WriteInFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(address = %self.conn.config.address(), "write abandoned, dropping connection");
            self.conn.stop_reader();
            self.conn.shared.set_state(ConnectionState::Disconnected);
        }
    }
}

/// Client connection to the remote application.
///
/// Closing the socket does not fail outstanding calls; they wait until
/// their own timeout fires.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    shared: Arc<Shared>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    reader: Mutex<Option<CancellationToken>>,
    next_id: AtomicU64,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                status: Mutex::new(Status {
                    state: ConnectionState::Disconnected,
                    generation: 0,
                }),
                pending: Mutex::new(HashMap::new()),
            }),
            writer: tokio::sync::Mutex::new(None),
            reader: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.status().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Number of calls still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.shared.pending().len()
    }

    /// Open the socket. No-op when already connected.
    ///
    /// Fails with `ConnectionTimeout` if the remote does not accept within
    /// the connect timeout, or `ConnectionFailed` if it refuses.
    pub async fn connect(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        if self.is_connected() && writer.is_some() {
            return Ok(());
        }

        self.stop_reader();
        self.shared.set_state(ConnectionState::Connecting);
        let address = self.config.address();
        debug!(%address, "connecting");

        let stream = match timeout(
            self.config.connect_timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(Error::connection_failed(format!("Failed to connect to {address}: {e}"))
                    .with_context("address", &address)
                    .with_source(e));
            }
            Err(_) => {
                self.shared.set_state(ConnectionState::Disconnected);
                return Err(Error::connection_timeout(format!(
                    "Connection to {address} timed out after {}ms",
                    self.config.connect_timeout.as_millis()
                ))
                .with_context("address", &address));
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let (read_half, write_half) = stream.into_split();
        let generation = {
            let mut status = self.shared.status();
            status.generation += 1;
            status.state = ConnectionState::Connected;
            status.generation
        };

        let cancel = CancellationToken::new();
        tokio::spawn(read_loop(
            read_half,
            Arc::clone(&self.shared),
            FrameDecoder::new(self.config.max_frame_bytes),
            cancel.clone(),
            generation,
        ));
        *self.reader_slot() = Some(cancel);
        *writer = Some(write_half);

        info!(%address, "connected");
        Ok(())
    }

    /// Close the socket. Outstanding calls are left to time out.
    pub async fn disconnect(&self) {
        let mut writer = self.writer.lock().await;
        self.stop_reader();
        if let Some(mut half) = writer.take() {
            let _ = half.shutdown().await;
            debug!(address = %self.config.address(), "disconnected");
        }
        self.shared.set_state(ConnectionState::Disconnected);
    }

    /// Send a command and wait for its result with the default timeout.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value> {
        self.send_with_timeout(method, params, self.config.request_timeout)
            .await
    }

    /// Send a command and wait at most `limit` for its result.
    ///
    /// Connects first if needed. `limit` covers writing the request as well
    /// as waiting for the reply. On timeout the pending call is removed and
    /// a `CommandTimeout` error naming `method` is returned.
    pub async fn send_with_timeout(
        &self,
        method: &str,
        params: Value,
        limit: Duration,
    ) -> Result<Value> {
        if !self.is_connected() {
            self.connect().await?;
        }

        let id = self.next_request_id();
        let request = Request::new(id.clone(), method, params);
        let mut payload = serde_json::to_vec(&request)
            .map_err(|e| Error::internal(format!("Failed to serialize request: {e}"), e))?;
        payload.extend_from_slice(self.config.framing.delimiter());

        let (reply, response) = oneshot::channel();
        self.shared.pending().insert(
            id.clone(),
            PendingCall {
                method: method.to_string(),
                created_at: Instant::now(),
                reply,
            },
        );
        let _guard = PendingGuard {
            shared: &self.shared,
            id: &id,
        };

        let exchange = async {
            self.write(&payload).await?;
            debug!(%id, method, "request sent");
            match response.await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::connection_failed(format!(
                    "Connection dropped before a response to {method}"
                ))),
            }
        };

        match timeout(limit, exchange).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(%id, method, timeout_ms = limit.as_millis() as u64, "command timed out");
                Err(Error::command_timeout(method, limit.as_millis()))
            }
        }
    }

    async fn write(&self, payload: &[u8]) -> Result<()> {
        let mut writer = self.writer.lock().await;
        let Some(mut half) = writer.take() else {
            return Err(Error::connection_failed("Not connected"));
        };
        let mut in_flight = WriteInFlight {
            conn: self,
            finished: false,
        };

        let written = async {
            half.write_all(payload).await?;
            half.flush().await
        }
        .await;
        in_flight.finished = true;

        match written {
            Ok(()) => {
                *writer = Some(half);
                Ok(())
            }
            Err(e) => {
                self.stop_reader();
                self.shared.set_state(ConnectionState::Disconnected);
                Err(Error::connection_failed(format!("Failed to write request: {e}")).with_source(e))
            }
        }
    }

    fn next_request_id(&self) -> String {
        self.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn stop_reader(&self) {
        if let Some(cancel) = self.reader_slot().take() {
            cancel.cancel();
        }
    }

    fn reader_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

async fn read_loop(
    mut socket: OwnedReadHalf,
    shared: Arc<Shared>,
    mut decoder: FrameDecoder,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            read = socket.read(&mut chunk) => read,
        };

        match read {
            Ok(0) => {
                info!("remote closed the connection");
                break;
            }
            Ok(n) => {
                decoder.push(&chunk[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(frame)) => shared.dispatch(frame),
                        Ok(None) => break,
                        Err(e) => warn!(error = %e, "discarding undecodable input"),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "connection read failed");
                break;
            }
        }
    }
    shared.mark_disconnected(generation);
}
