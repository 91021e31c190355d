//! In-process stand-in for the remote application.

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::{ConnectionConfig, FrameDecoder};

pub(crate) struct FakeRemote {
    listener: TcpListener,
}

impl FakeRemote {
    /// Listen on an ephemeral local port; the config points at it.
    pub(crate) async fn bind() -> (Self, ConnectionConfig) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let mut config = ConnectionConfig::new("127.0.0.1", port);
        config.connect_timeout = Duration::from_secs(2);
        (Self { listener }, config)
    }

    /// Config for a port nothing listens on.
    pub(crate) async fn unused_port() -> ConnectionConfig {
        let (remote, config) = Self::bind().await;
        drop(remote);
        config
    }

    /// Listener whose accept queue is full, so further connects hang.
    pub(crate) async fn backlogged() -> (Backlogged, ConnectionConfig) {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let address = listener.local_addr().unwrap();

        let mut queued = Vec::new();
        for _ in 0..8 {
            match tokio::time::timeout(Duration::from_millis(200), TcpStream::connect(address)).await {
                Ok(Ok(stream)) => queued.push(stream),
                _ => break,
            }
        }
        let config = ConnectionConfig::new("127.0.0.1", address.port());
        (
            Backlogged {
                _listener: listener,
                _queued: queued,
            },
            config,
        )
    }

    pub(crate) async fn accept(&self) -> Peer {
        let (stream, _) = tokio::time::timeout(Duration::from_secs(5), self.listener.accept())
            .await
            .unwrap()
            .unwrap();
        Peer {
            stream,
            decoder: FrameDecoder::default(),
        }
    }

    /// True if no further connection arrives within a short grace period.
    pub(crate) async fn no_pending_accept(&self) -> bool {
        tokio::time::timeout(Duration::from_millis(50), self.listener.accept())
            .await
            .is_err()
    }
}

pub(crate) struct Backlogged {
    _listener: TcpListener,
    _queued: Vec<TcpStream>,
}

pub(crate) struct Peer {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl Peer {
    pub(crate) async fn next_request(&mut self) -> Value {
        let mut chunk = [0u8; 4096];
        loop {
            if let Some(request) = self.decoder.next_frame().unwrap() {
                return request;
            }
            let n = self.stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection");
            self.decoder.push(&chunk[..n]);
        }
    }

    /// Bytes received after the last decoded request.
    pub(crate) fn buffered(&self) -> usize {
        self.decoder.buffered()
    }

    pub(crate) async fn reply(&mut self, response: Value) {
        self.write_raw(response.to_string().as_bytes()).await;
    }

    pub(crate) async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    /// Wait until the client closes its side.
    pub(crate) async fn closed(&mut self) -> bool {
        let mut chunk = [0u8; 4096];
        loop {
            match tokio::time::timeout(Duration::from_secs(5), self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) | Ok(Err(_)) => return true,
                Ok(Ok(_)) => continue,
                Err(_) => return false,
            }
        }
    }
}
