//! Ingestion counters.

use crate::error::FeedError;
use vwap_core::CoreError;
use vwap_telemetry::StatsSnapshot;

/// Counters owned by the ingestion loop.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
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

impl IngestStats {
    pub fn record_error(&mut self, error: &FeedError) {
        match error {
            FeedError::Unparseable(_) => self.decode_errors += 1,
            FeedError::NumericParse { .. } => self.numeric_errors += 1,
            FeedError::Core(CoreError::ZeroVolume) => self.zero_volume_skips += 1,
            FeedError::Core(_) => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            payloads: self.payloads,
            updates: self.updates,
            notices: self.notices,
            accepted_changes: self.accepted_changes,
            dubious_changes: self.dubious_changes,
            emissions: self.emissions,
            decode_errors: self.decode_errors,
            numeric_errors: self.numeric_errors,
            zero_volume_skips: self.zero_volume_skips,
        }
    }
}
