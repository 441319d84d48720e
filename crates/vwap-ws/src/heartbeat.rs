//! Liveness monitoring for WebSocket connections.
//!
//! Tracks ping/pong timing and message activity so the connection loop can
//! send a ping when the feed goes quiet and give up when no pong arrives.

use parking_lot::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct HeartbeatState {
    last_ping: Option<Instant>,
    last_message: Instant,
    waiting_for_pong: bool,
    last_rtt: Option<Duration>,
}

impl HeartbeatState {
    fn fresh() -> Self {
        Self {
            last_ping: None,
            last_message: Instant::now(),
            waiting_for_pong: false,
            last_rtt: None,
        }
    }
}

/// Heartbeat manager for WebSocket connection health.
#[derive(Debug)]
pub struct HeartbeatManager {
    /// Quiet period after which a ping is sent.
    interval: Duration,
    /// How long to wait for the pong.
    timeout: Duration,
    state: Mutex<HeartbeatState>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            state: Mutex::new(HeartbeatState::fresh()),
        }
    }

    /// Reset state (called on every new connection).
    pub fn reset(&self) {
        *self.state.lock() = HeartbeatState::fresh();
    }

    pub fn record_ping(&self) {
        let mut state = self.state.lock();
        state.last_ping = Some(Instant::now());
        state.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut state = self.state.lock();
        state.waiting_for_pong = false;
        state.last_message = Instant::now();
        if let Some(ping) = state.last_ping {
            let rtt = ping.elapsed();
            state.last_rtt = Some(rtt);
            debug!(rtt_ms = rtt.as_millis() as u64, "Received pong");
        }
    }

    /// Record that any frame was received.
    pub fn record_message(&self) {
        self.state.lock().last_message = Instant::now();
    }

    /// True if a ping is outstanding for longer than the timeout.
    pub fn is_timed_out(&self) -> bool {
        let state = self.state.lock();
        match (state.waiting_for_pong, state.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// True if the feed has been quiet for the interval and no ping is outstanding.
    pub fn should_send_ping(&self) -> bool {
        let state = self.state.lock();
        !state.waiting_for_pong && state.last_message.elapsed() >= self.interval
    }

    /// Round-trip time of the last ping/pong exchange.
    pub fn last_rtt(&self) -> Option<Duration> {
        self.state.lock().last_rtt
    }

    /// Wait for the next heartbeat check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }
}
