//! Connection lifecycle around tool calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fault::{Error, Result};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{Connection, ConnectionConfig};

/// How connections are reused across calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePolicy {
    /// Fresh connection per call, always closed afterwards.
    #[default]
    Ephemeral,
    /// One shared connection, reconnected when it reports disconnected.
    Persistent,
}

/// Connection manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub connection: ConnectionConfig,
    pub lifecycle: LifecyclePolicy,
    /// Reconnect tries for a dropped persistent connection.
    pub reconnect_attempts: u32,
    /// Base delay between reconnect tries; grows linearly.
    pub reconnect_backoff: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            lifecycle: LifecyclePolicy::default(),
            reconnect_attempts: 3,
            reconnect_backoff: Duration::from_millis(500),
        }
    }
}

/// Hands out live connections according to the lifecycle policy.
#[derive(Debug)]
pub struct ConnectionManager {
    config: ManagerConfig,
    cached: Mutex<Option<Arc<Connection>>>,
}

impl ConnectionManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            cached: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> LifecyclePolicy {
        self.config.lifecycle
    }

    /// Run `operation` with a live connection and return its result.
    ///
    /// Ephemeral connections are closed afterwards whatever the outcome;
    /// dropping the returned future closes them too.
    pub async fn with_connection<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<Connection>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match self.config.lifecycle {
            LifecyclePolicy::Ephemeral => {
                let conn = Arc::new(Connection::new(self.config.connection.clone()));
                conn.connect().await?;
                let outcome = operation(Arc::clone(&conn)).await;
                conn.disconnect().await;
                outcome
            }
            LifecyclePolicy::Persistent => {
                let conn = self.acquire().await?;
                operation(conn).await
            }
        }
    }

    /// The shared connection, connecting or reconnecting it as needed.
    pub async fn acquire(&self) -> Result<Arc<Connection>> {
        let mut cached = self.cached.lock().await;

        if let Some(conn) = cached.as_ref() {
            if conn.is_connected() {
                return Ok(Arc::clone(conn));
            }
            let conn = Arc::clone(conn);
            return match self.reconnect(&conn).await {
                Ok(()) => Ok(conn),
                Err(e) => {
                    cached.take();
                    Err(e)
                }
            };
        }

        let conn = Arc::new(Connection::new(self.config.connection.clone()));
        conn.connect().await?;
        *cached = Some(Arc::clone(&conn));
        Ok(conn)
    }

    async fn reconnect(&self, conn: &Connection) -> Result<()> {
        let attempts = self.config.reconnect_attempts.max(1);
        let address = self.config.connection.address();

        for attempt in 1..=attempts {
            match conn.connect().await {
                Ok(()) => {
                    info!(%address, attempt, "reconnected");
                    return Ok(());
                }
                Err(e) => {
                    warn!(%address, attempt, attempts, error = %e, "reconnect failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.reconnect_backoff * attempt).await;
                    }
                }
            }
        }

        Err(Error::reconnection_failed(
            format!("Failed to reconnect to {address} after {attempts} attempts"),
            attempts,
        ))
    }

    /// Close the shared connection, if any.
    pub async fn shutdown(&self) {
        if let Some(conn) = self.cached.lock().await.take() {
            debug!(address = %self.config.connection.address(), "closing persistent connection");
            conn.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeRemote;
    use fault::ErrorKind;
    use serde_json::json;

    fn manager(connection: ConnectionConfig, lifecycle: LifecyclePolicy) -> ConnectionManager {
        ConnectionManager::new(ManagerConfig {
            connection,
            lifecycle,
            reconnect_attempts: 2,
            reconnect_backoff: Duration::from_millis(10),
        })
    }

    async fn wait_disconnected(conn: &Connection) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while conn.is_connected() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn ephemeral_opens_and_closes_per_call() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Ephemeral);

        let server = tokio::spawn(async move {
            for _ in 0..2 {
                let mut peer = remote.accept().await;
                let request = peer.next_request().await;
                peer.reply(json!({"id": request["id"], "result": request["method"]}))
                    .await;
                assert!(peer.closed().await);
            }
        });

        for method in ["first", "second"] {
            let result = manager
                .with_connection(|conn| async move { conn.send(method, json!({})).await })
                .await
                .unwrap();
            assert_eq!(result, json!(method));
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn ephemeral_closes_on_failure() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Ephemeral);

        let server = tokio::spawn(async move {
            let mut peer = remote.accept().await;
            peer.closed().await
        });

        let err = manager
            .with_connection(|_conn| async { Err::<(), _>(Error::validation("bad input", None, None)) })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "bad input");
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn persistent_reuses_one_connection() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Persistent);

        let server = tokio::spawn(async move {
            let mut peer = remote.accept().await;
            for _ in 0..3 {
                let request = peer.next_request().await;
                peer.reply(json!({"id": request["id"], "result": true})).await;
            }
            remote.no_pending_accept().await
        });

        for _ in 0..3 {
            let ok = manager
                .with_connection(|conn| async move { conn.send("ping", json!({})).await })
                .await
                .unwrap();
            assert_eq!(ok, json!(true));
        }
        assert!(server.await.unwrap());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn persistent_reconnects_after_drop() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Persistent);

        let first = manager.acquire().await.unwrap();
        drop(remote.accept().await);
        wait_disconnected(&first).await;

        let second = manager.acquire().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_connected());
        let _peer = remote.accept().await;
    }

    #[tokio::test]
    async fn persistent_gives_up_after_attempts() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Persistent);

        let conn = manager.acquire().await.unwrap();
        let peer = remote.accept().await;
        drop(remote);
        drop(peer);
        wait_disconnected(&conn).await;

        let err = manager.acquire().await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ReconnectionFailed { attempts: 2 });

        // The failed connection is not cached.
        let err = manager.acquire().await.unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn first_connect_failure_propagates() {
        let config = FakeRemote::unused_port().await;
        let manager = manager(config, LifecyclePolicy::Ephemeral);
        let err = manager
            .with_connection(|conn| async move { conn.send("ping", json!({})).await })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::ConnectionFailed);
    }

    #[tokio::test]
    async fn shutdown_closes_persistent_connection() {
        let (remote, config) = FakeRemote::bind().await;
        let manager = manager(config, LifecyclePolicy::Persistent);
        let conn = manager.acquire().await.unwrap();
        let mut peer = remote.accept().await;

        manager.shutdown().await;
        assert!(!conn.is_connected());
        assert!(peer.closed().await);
    }

    #[test]
    fn lifecycle_parses_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            lifecycle: LifecyclePolicy,
        }
        let w: Wrapper = serde_json::from_str(r#"{"lifecycle":"persistent"}"#).unwrap();
        assert_eq!(w.lifecycle, LifecyclePolicy::Persistent);
    }
}
