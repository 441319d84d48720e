//! Periodic statistics summary.
//!
//! The ingestion loop owns the counters and hands a [`StatsSnapshot`] to the
//! reporter; per-instrument figures are read back from the Prometheus gauges.

use crate::metrics::{DUBIOUS_CHANGES_TOTAL, VWAP_PRICE, WINDOW_LEN};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Point-in-time copy of the ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub payloads: u64,
    pub updates: u64,
    pub notices: u64,
    pub accepted_changes: u64,
    pub dubious_changes: u64,
    pub emissions: u64,
    pub decode_errors: u64,
    pub numeric_errors: u64,
    pub zero_volume_skips: u64,
}

impl StatsSnapshot {
    /// Payloads that produced a diagnostic instead of being processed.
    pub fn rejected(&self) -> u64 {
        self.decode_errors + self.numeric_errors
    }
}

/// Per-instrument view for the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductStats {
    pub product_id: String,
    /// `None` until the first emission.
    pub vwap: Option<f64>,
    pub window_len: u64,
    pub dubious_changes: u64,
}

/// Statistics reporter.
pub struct StatsReporter {
    product_ids: Vec<String>,
    start_time: DateTime<Utc>,
}

impl StatsReporter {
    pub fn new(product_ids: Vec<String>) -> Self {
        Self {
            product_ids,
            start_time: Utc::now(),
        }
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Current per-instrument figures for every subscribed instrument.
    pub fn product_stats(&self) -> Vec<ProductStats> {
        self.product_ids
            .iter()
            .map(|product_id| {
                let window_len = WINDOW_LEN.with_label_values(&[product_id]).get() as u64;
                let vwap = (window_len > 0)
                    .then(|| VWAP_PRICE.with_label_values(&[product_id]).get());
                ProductStats {
                    product_id: product_id.clone(),
                    vwap,
                    window_len,
                    dubious_changes: DUBIOUS_CHANGES_TOTAL
                        .with_label_values(&[product_id])
                        .get() as u64,
                }
            })
            .collect()
    }

    /// Log the summary.
    pub fn output_summary(&self, snapshot: &StatsSnapshot) {
        let duration = Utc::now() - self.start_time;
        let hours = duration.num_hours();
        let minutes = duration.num_minutes() % 60;

        info!("========== VWAP Statistics Summary ==========");
        info!(
            "Since: {} ({} hours {} minutes)",
            self.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
            hours,
            minutes
        );
        info!(
            "Payloads: {} (updates: {}, notices: {}, rejected: {})",
            snapshot.payloads,
            snapshot.updates,
            snapshot.notices,
            snapshot.rejected()
        );
        info!(
            "Changes: accepted={}, dubious={}, emissions={}, zero-volume skips={}",
            snapshot.accepted_changes,
            snapshot.dubious_changes,
            snapshot.emissions,
            snapshot.zero_volume_skips
        );
        info!(
            "Errors: decode={}, numeric={}",
            snapshot.decode_errors, snapshot.numeric_errors
        );

        for p in self.product_stats() {
            match p.vwap {
                Some(vwap) => info!(
                    "  {}: vwap={:.8} window={} dubious={}",
                    p.product_id, vwap, p.window_len, p.dubious_changes
                ),
                None => info!("  {}: no data", p.product_id),
            }
        }

        info!("=============================================");
    }
}
