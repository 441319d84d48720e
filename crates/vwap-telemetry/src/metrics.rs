//! Prometheus metrics for ws-vwap.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error surfaced on first
//! use of the metric.

use crate::error::TelemetryResult;
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, CounterVec, Encoder, Gauge,
    GaugeVec, TextEncoder,
};

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "vwap_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Total WebSocket reconnection attempts.
pub static WS_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vwap_ws_reconnect_total",
        "Total WebSocket reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Payloads decoded, by message kind.
/// Labels: kind (update/subscriptions/error/snapshot)
pub static PAYLOADS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vwap_payloads_total",
        "Total payloads decoded by message kind",
        &["kind"]
    )
    .unwrap()
});

/// Payloads rejected or skipped, by reason.
pub static PAYLOAD_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vwap_payload_errors_total",
        "Total payload processing errors by reason",
        &["reason"]
    )
    .unwrap()
});

/// Changes excluded by the dubious filter.
pub static DUBIOUS_CHANGES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "vwap_dubious_changes_total",
        "Total changes excluded as dubious",
        &["product_id"]
    )
    .unwrap()
});

/// Latest VWAP per instrument.
pub static VWAP_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "vwap_price",
        "Latest volume-weighted average price",
        &["product_id"]
    )
    .unwrap()
});

/// Samples currently held in each instrument's window.
pub static WINDOW_LEN: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "vwap_window_len",
        "Number of samples in the sliding window",
        &["product_id"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Record WebSocket connected.
    pub fn ws_connected() {
        WS_CONNECTED.set(1.0);
    }

    /// Record WebSocket disconnected.
    pub fn ws_disconnected() {
        WS_CONNECTED.set(0.0);
    }

    /// Record WebSocket reconnection.
    pub fn ws_reconnect(reason: &str) {
        WS_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a decoded payload.
    pub fn payload_decoded(kind: &str) {
        PAYLOADS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record a payload error.
    pub fn payload_error(reason: &str) {
        PAYLOAD_ERRORS_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a change dropped by the dubious filter.
    pub fn dubious_change(product_id: &str) {
        DUBIOUS_CHANGES_TOTAL.with_label_values(&[product_id]).inc();
    }

    /// Record a VWAP emission.
    pub fn vwap_updated(product_id: &str, vwap: f64, window_len: usize) {
        VWAP_PRICE.with_label_values(&[product_id]).set(vwap);
        WINDOW_LEN
            .with_label_values(&[product_id])
            .set(window_len as f64);
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vwap_updated_sets_gauges() {
        Metrics::vwap_updated("TEST-METRICS", 42.5, 3);
        assert_eq!(VWAP_PRICE.with_label_values(&["TEST-METRICS"]).get(), 42.5);
        assert_eq!(WINDOW_LEN.with_label_values(&["TEST-METRICS"]).get(), 3.0);
    }

    #[test]
    fn test_counters_increment() {
        let before = DUBIOUS_CHANGES_TOTAL
            .with_label_values(&["TEST-DUBIOUS"])
            .get();
        Metrics::dubious_change("TEST-DUBIOUS");
        Metrics::dubious_change("TEST-DUBIOUS");
        let after = DUBIOUS_CHANGES_TOTAL
            .with_label_values(&["TEST-DUBIOUS"])
            .get();
        assert_eq!(after - before, 2.0);
    }

    #[test]
    fn test_render_contains_metric_names() {
        Metrics::ws_connected();
        Metrics::payload_decoded("update");
        Metrics::vwap_updated("TEST-RENDER", 1.0, 1);

        let text = Metrics::render().unwrap();
        assert!(text.contains("vwap_ws_connected 1"));
        assert!(text.contains("vwap_payloads_total"));
        assert!(text.contains("vwap_price{product_id=\"TEST-RENDER\"} 1"));
    }
}
