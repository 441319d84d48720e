//! WebSocket connection manager.
//!
//! Handles connection lifecycle, automatic reconnection with exponential backoff,
//! and re-subscription after every reconnect. Text frames are handed to the
//! consumer unparsed through a bounded channel.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::message::{SubscribeRequest, LEVEL2_CHANNEL};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vwap_telemetry::Metrics;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Instruments to subscribe to.
    pub product_ids: Vec<String>,
    /// Channels to subscribe to.
    pub channels: Vec<String>,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff.
    pub reconnect_base_delay_ms: u64,
    /// Maximum delay for exponential backoff.
    pub reconnect_max_delay_ms: u64,
    /// Quiet period before a ping is sent.
    pub heartbeat_interval_ms: u64,
    /// Heartbeat timeout (pong must arrive within this).
    pub heartbeat_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            product_ids: Vec::new(),
            channels: vec![LEVEL2_CHANNEL.to_string()],
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 60000,
            heartbeat_interval_ms: 30000,
            heartbeat_timeout_ms: 10000,
        }
    }
}

impl ConnectionConfig {
    /// The subscription sent after each successful connect.
    pub fn subscribe_request(&self) -> SubscribeRequest {
        SubscribeRequest::new(self.product_ids.clone(), self.channels.clone())
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    payload_tx: mpsc::Sender<String>,
    reconnect_count: Arc<RwLock<u32>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    ///
    /// Every text frame received is forwarded to `payload_tx`. Cancelling
    /// `shutdown_token` closes the socket and stops reconnecting.
    pub fn new(
        config: ConnectionConfig,
        payload_tx: mpsc::Sender<String>,
        shutdown_token: CancellationToken,
    ) -> Self {
        let heartbeat = Arc::new(HeartbeatManager::new(
            config.heartbeat_interval_ms,
            config.heartbeat_timeout_ms,
        ));
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            heartbeat,
            payload_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            shutdown_token,
        }
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Consecutive failed connection attempts since the last successful connect.
    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    /// Signal graceful shutdown.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    /// Check if shutdown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
        if state == ConnectionState::Connected {
            Metrics::ws_connected();
        } else {
            Metrics::ws_disconnected();
        }
    }

    /// Connect and run the message loop, reconnecting until shutdown or
    /// `max_reconnect_attempts` is exhausted.
    pub async fn connect(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);

            let reason = match self.try_connect().await {
                Ok(()) => {
                    info!("WebSocket connection closed");
                    "closed"
                }
                Err(e) => {
                    error!(?e, "WebSocket connection error");
                    reconnect_reason(&e)
                }
            };

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                self.set_state(ConnectionState::Disconnected);
                return Ok(());
            }

            // A connection that got as far as Connected resets the counter.
            let attempt = self.reconnect_count() + 1;
            *self.reconnect_count.write() = attempt;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                self.set_state(ConnectionState::Disconnected);
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            self.set_state(ConnectionState::Reconnecting);
            Metrics::ws_reconnect(reason);

            let delay = backoff_delay(
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
                attempt,
            ) + Duration::from_millis(rand_jitter());
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Connected);
        *self.reconnect_count.write() = 0;
        info!("WebSocket connected");

        self.send_subscription(&mut write).await?;
        self.heartbeat.reset();

        loop {
            tokio::select! {
                biased;

                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.forward_payload(text).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            self.heartbeat.record_message();
                            debug!(len = data.len(), "Ignoring binary frame");
                        }
                        Some(Ok(Message::Ping(data))) => {
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason): (u16, String) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                    }
                }

                () = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_timed_out() {
                        error!("Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }

                    if self.heartbeat.should_send_ping() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn send_subscription(&self, write: &mut WsSink) -> WsResult<()> {
        let request = self.config.subscribe_request();
        let text = request.to_json()?;
        info!(
            products = ?request.product_ids,
            channels = ?request.channels,
            "Sending subscribe"
        );
        write.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn forward_payload(&self, text: String) {
        self.heartbeat.record_message();
        if self.payload_tx.send(text).await.is_err() {
            // Nobody is consuming payloads anymore; stop the transport too.
            warn!("Payload receiver dropped");
            self.shutdown_token.cancel();
        }
    }
}

/// Exponential backoff without jitter: `base * 2^(attempt-1)`, capped at `max`.
pub fn backoff_delay(base_ms: u64, max_ms: u64, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

/// Generate random jitter (0-1000ms).
fn rand_jitter() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    u64::from(nanos % 1000)
}

fn reconnect_reason(e: &WsError) -> &'static str {
    match e {
        WsError::ConnectionClosed { .. } => "server_close",
        WsError::HeartbeatTimeout => "heartbeat_timeout",
        WsError::Tungstenite(_) => "transport_error",
        WsError::ConnectionFailed(_) | WsError::Json(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.heartbeat_interval_ms, 30000);
        assert_eq!(config.channels, vec!["level2"]);
    }

    #[test]
    fn test_subscribe_request_from_config() {
        let config = ConnectionConfig {
            product_ids: vec!["BTC-USD".to_string()],
            ..Default::default()
        };
        let req = config.subscribe_request();
        assert_eq!(req.product_ids, vec!["BTC-USD"]);
        assert_eq!(req.channels, vec!["level2"]);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_delay(1000, 60000, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(1000, 60000, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1000, 60000, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(1000, 60000, 7), Duration::from_millis(60000));
        assert_eq!(backoff_delay(1000, 60000, 40), Duration::from_millis(60000));
    }

    #[test]
    fn test_jitter_bounded() {
        for _ in 0..100 {
            assert!(rand_jitter() < 1000);
        }
    }

    #[test]
    fn test_reconnect_reason_labels() {
        assert_eq!(reconnect_reason(&WsError::HeartbeatTimeout), "heartbeat_timeout");
        assert_eq!(
            reconnect_reason(&WsError::ConnectionClosed {
                code: 1001,
                reason: "going away".to_string()
            }),
            "server_close"
        );
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_returns_immediately() {
        let (tx, _rx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let manager = ConnectionManager::new(
            ConnectionConfig {
                url: "ws://127.0.0.1:1".to_string(),
                ..Default::default()
            },
            tx,
            token.clone(),
        );

        manager.shutdown();
        assert!(token.is_cancelled());
        tokio_test::assert_ok!(manager.connect().await);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
