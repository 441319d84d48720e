//! WebSocket client for the ws-vwap level2 feed.
//!
//! Provides:
//! - Automatic reconnection with exponential backoff
//! - Subscription request sent on every (re)connect
//! - Ping/pong liveness monitoring
//! - Raw text payload handoff over a bounded channel

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod message;

pub use connection::{ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatManager;
pub use message::{SubscribeRequest, LEVEL2_CHANNEL};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
