//! Ingestion loop: payload -> decode -> filter -> window -> VWAP.
//!
//! One payload is fully processed before the next is taken from the
//! channel. Decode and translate failures are reported and skipped; they
//! never touch a window.

use crate::error::FeedResult;
use crate::filter::{ChangeFilter, DubiousFilter};
use crate::parser::{
    ErrorNotice, FeedMessage, MessageDecoder, SnapshotNotice, SubscriptionsAck, TypedUpdate,
};
use crate::registry::WindowRegistry;
use crate::stats::IngestStats;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vwap_core::{compute_vwap, CoreError};
use vwap_telemetry::{Metrics, StatsReporter, StatsSnapshot};

/// Longest payload prefix included in diagnostics.
const PAYLOAD_PREVIEW_LEN: usize = 256;

/// One VWAP value, produced after each accepted change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VwapEmission {
    pub product_id: String,
    pub vwap: f64,
    pub window_len: usize,
}

/// Outcome of one payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Processed {
    Update {
        product_id: String,
        emissions: Vec<VwapEmission>,
        dubious: usize,
    },
    Subscriptions(SubscriptionsAck),
    Error(ErrorNotice),
    Snapshot(SnapshotNotice),
}

impl Processed {
    /// Emissions of an update; empty for notices.
    pub fn emissions(&self) -> &[VwapEmission] {
        match self {
            Self::Update { emissions, .. } => emissions,
            _ => &[],
        }
    }
}

/// Drives decoding and aggregation for all instruments.
pub struct IngestionLoop<F = DubiousFilter> {
    decoder: MessageDecoder,
    filter: F,
    registry: WindowRegistry,
    stats: IngestStats,
    reporter: Option<(StatsReporter, Duration)>,
}

impl<F: ChangeFilter> IngestionLoop<F> {
    pub fn new(registry: WindowRegistry, filter: F) -> Self {
        Self {
            decoder: MessageDecoder::new(),
            filter,
            registry,
            stats: IngestStats::default(),
            reporter: None,
        }
    }

    /// Log a statistics summary every `interval` while running, and once at the end.
    pub fn with_stats_reporter(mut self, reporter: StatsReporter, interval: Duration) -> Self {
        self.reporter = Some((reporter, interval));
        self
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    pub fn decoder(&self) -> &MessageDecoder {
        &self.decoder
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Process one payload.
    ///
    /// Errors are already logged and counted when returned; callers may
    /// ignore them and continue with the next payload.
    pub fn process(&mut self, payload: &[u8]) -> FeedResult<Processed> {
        self.stats.payloads += 1;
        let result = self
            .decoder
            .parse(payload)
            .and_then(|msg| self.dispatch(msg));

        if let Err(e) = &result {
            self.stats.record_error(e);
            Metrics::payload_error(e.reason());
            warn!(
                error = %e,
                payload = %preview(payload),
                "Dropping payload"
            );
        }
        result
    }

    fn dispatch(&mut self, msg: FeedMessage) -> FeedResult<Processed> {
        Metrics::payload_decoded(msg.kind());
        match msg {
            FeedMessage::Update(update) => {
                self.stats.updates += 1;
                self.apply_update(update)
            }
            FeedMessage::Subscriptions(ack) => {
                self.stats.notices += 1;
                for channel in &ack.channels {
                    info!(
                        channel = %channel.name,
                        products = ?channel.product_ids,
                        "Subscription confirmed"
                    );
                }
                Ok(Processed::Subscriptions(ack))
            }
            FeedMessage::Error(notice) => {
                self.stats.notices += 1;
                warn!(
                    message = %notice.message,
                    reason = notice.reason.as_deref().unwrap_or(""),
                    "Feed reported error"
                );
                Ok(Processed::Error(notice))
            }
            FeedMessage::Snapshot(snapshot) => {
                self.stats.notices += 1;
                debug!(
                    product_id = %snapshot.product_id,
                    asks = snapshot.asks.len(),
                    bids = snapshot.bids.len(),
                    "Snapshot received"
                );
                Ok(Processed::Snapshot(snapshot))
            }
        }
    }

    fn apply_update(&mut self, update: TypedUpdate) -> FeedResult<Processed> {
        let product_id = update.product_id;
        let mut emissions = Vec::with_capacity(update.changes.len());
        let mut dubious = 0;

        for change in &update.changes {
            if self.filter.is_dubious(change) {
                dubious += 1;
                self.stats.dubious_changes += 1;
                Metrics::dubious_change(&product_id);
                debug!(%product_id, price = change.price, "Skipping dubious change");
                continue;
            }

            let window = self.registry.get_or_create(&product_id);
            window.push((*change).into());
            self.stats.accepted_changes += 1;

            match compute_vwap(window) {
                Ok(vwap) => {
                    let window_len = window.len();
                    self.stats.emissions += 1;
                    Metrics::vwap_updated(&product_id, vwap, window_len);
                    info!(%product_id, vwap, window_len, "VWAP updated");
                    emissions.push(VwapEmission {
                        product_id: product_id.clone(),
                        vwap,
                        window_len,
                    });
                }
                Err(CoreError::ZeroVolume) => {
                    self.stats.zero_volume_skips += 1;
                    Metrics::payload_error("zero_volume");
                    debug!(%product_id, "Window volume is zero, no VWAP emitted");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(Processed::Update {
            product_id,
            emissions,
            dubious,
        })
    }

    /// Consume payloads until the channel closes or `shutdown` fires.
    ///
    /// A payload already taken from the channel is always finished.
    /// Returns the final counters.
    pub async fn run(
        &mut self,
        mut rx: mpsc::Receiver<String>,
        shutdown: CancellationToken,
    ) -> StatsSnapshot {
        let reporting = self.reporter.is_some();
        let period = self
            .reporter
            .as_ref()
            .map_or(Duration::from_secs(60), |(_, interval)| *interval)
            .max(Duration::from_secs(1));
        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately.
        ticker.tick().await;

        info!(capacity = self.registry.capacity(), "Ingestion loop started");

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping ingestion");
                    break;
                }

                payload = rx.recv() => match payload {
                    Some(payload) => {
                        // Errors are logged and counted by process().
                        let _ = self.process(payload.as_bytes());
                    }
                    None => {
                        info!("Payload channel closed, stopping ingestion");
                        break;
                    }
                },

                _ = ticker.tick(), if reporting => {
                    self.report();
                }
            }
        }

        self.report();
        let snapshot = self.stats.snapshot();
        info!(
            payloads = snapshot.payloads,
            emissions = snapshot.emissions,
            rejected = snapshot.rejected(),
            instruments = self.registry.len(),
            "Ingestion loop stopped"
        );
        snapshot
    }

    fn report(&self) {
        if let Some((reporter, _)) = &self.reporter {
            reporter.output_summary(&self.stats.snapshot());
        }
    }
}

fn preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    match text.char_indices().nth(PAYLOAD_PREVIEW_LEN) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::parser::UpdateChange;
    use serde_json::json;

    const EPS: f64 = 1e-9;

    fn update(product_id: &str, changes: &[(&str, &str)]) -> Vec<u8> {
        let changes: Vec<_> = changes
            .iter()
            .map(|(price, size)| json!(["buy", price, size]))
            .collect();
        json!({
            "type": "l2update",
            "product_id": product_id,
            "changes": changes,
            "time": "2022-01-17T02:57:26.530613Z"
        })
        .to_string()
        .into_bytes()
    }

    fn ingest(capacity: usize) -> IngestionLoop {
        IngestionLoop::new(
            WindowRegistry::new(capacity).unwrap(),
            DubiousFilter::default(),
        )
    }

    fn vwaps(processed: &Processed) -> Vec<f64> {
        processed.emissions().iter().map(|e| e.vwap).collect()
    }

    #[test]
    fn test_emits_vwap_per_change_in_order() {
        let mut ingest = ingest(3);
        let mut all = Vec::new();

        for (price, size) in [("1", "1"), ("2", "1"), ("3", "2"), ("4", "3"), ("5", "4")] {
            let processed = ingest
                .process(&update("BTC-USD", &[(price, size)]))
                .unwrap();
            all.extend(vwaps(&processed));
        }

        let expected = [1.0, 1.5, 2.25, 20.0 / 6.0, 38.0 / 9.0];
        assert_eq!(all.len(), expected.len());
        for (actual, expected) in all.iter().zip(expected) {
            assert!((actual - expected).abs() < EPS, "{actual} != {expected}");
        }
        assert_eq!(ingest.registry().get("BTC-USD").unwrap().len(), 3);
    }

    #[test]
    fn test_multiple_changes_in_one_payload() {
        let mut ingest = ingest(3);
        let processed = ingest
            .process(&update("ETH-USD", &[("1", "1"), ("2", "1"), ("3", "2")]))
            .unwrap();

        let emissions = processed.emissions();
        assert_eq!(emissions.len(), 3);
        assert_eq!(emissions[2].window_len, 3);
        assert!((emissions[2].vwap - 2.25).abs() < EPS);
        assert!(emissions.iter().all(|e| e.product_id == "ETH-USD"));
    }

    #[test]
    fn test_instruments_have_separate_windows() {
        let mut ingest = ingest(2);
        ingest.process(&update("BTC-USD", &[("10", "1")])).unwrap();
        ingest.process(&update("ETH-BTC", &[("0.05", "2")])).unwrap();
        let processed = ingest.process(&update("BTC-USD", &[("20", "1")])).unwrap();

        assert_eq!(vwaps(&processed), vec![15.0]);
        assert_eq!(ingest.registry().product_ids(), vec!["BTC-USD", "ETH-BTC"]);
        assert_eq!(ingest.registry().get("ETH-BTC").unwrap().len(), 1);
    }

    #[test]
    fn test_dubious_change_excluded() {
        let mut ingest = ingest(3);
        let processed = ingest
            .process(&update("BTC-USD", &[("100.00", "5"), ("200", "1")]))
            .unwrap();

        assert_eq!(vwaps(&processed), vec![200.0]);
        assert!(matches!(processed, Processed::Update { dubious: 1, .. }));
        assert_eq!(ingest.registry().get("BTC-USD").unwrap().len(), 1);
        assert_eq!(ingest.stats().dubious_changes, 1);
    }

    #[test]
    fn test_only_dubious_changes_create_no_window() {
        let mut ingest = ingest(3);
        let processed = ingest
            .process(&update("ETH-USD", &[("100.00", "1")]))
            .unwrap();

        assert!(processed.emissions().is_empty());
        assert!(ingest.registry().get("ETH-USD").is_none());
    }

    #[test]
    fn test_dubious_filter_disabled_keeps_sentinel() {
        let mut ingest = IngestionLoop::new(WindowRegistry::new(3).unwrap(), DubiousFilter::disabled());
        let processed = ingest
            .process(&update("BTC-USD", &[("100.00", "5")]))
            .unwrap();
        assert_eq!(vwaps(&processed), vec![100.0]);
    }

    #[test]
    fn test_custom_filter() {
        let mut ingest = IngestionLoop::new(
            WindowRegistry::new(3).unwrap(),
            |c: &UpdateChange| c.price > 1000.0,
        );
        let processed = ingest
            .process(&update("BTC-USD", &[("5000", "1"), ("10", "1")]))
            .unwrap();
        assert_eq!(vwaps(&processed), vec![10.0]);
    }

    #[test]
    fn test_numeric_error_leaves_windows_untouched() {
        let mut ingest = ingest(3);
        let err = ingest
            .process(&update("BTC-USD", &[("10", "1"), ("oops", "1")]))
            .unwrap_err();

        assert!(matches!(err, FeedError::NumericParse { field: "price", .. }));
        assert!(ingest.registry().get("BTC-USD").is_none());
        assert_eq!(ingest.stats().numeric_errors, 1);
    }

    #[test]
    fn test_continues_after_bad_payloads() {
        let mut ingest = ingest(3);

        assert!(ingest.process(b"").is_err());
        assert!(ingest.process(b"{not json").is_err());
        assert!(ingest
            .process(br#"{"type":"ticker","product_id":"BTC-USD"}"#)
            .is_err());
        assert!(ingest
            .process(&update("BTC-USD", &[("1", "x")]))
            .is_err());

        let processed = ingest.process(&update("BTC-USD", &[("7", "1")])).unwrap();
        assert_eq!(vwaps(&processed), vec![7.0]);

        let stats = ingest.stats().snapshot();
        assert_eq!(stats.payloads, 5);
        assert_eq!(stats.decode_errors, 3);
        assert_eq!(stats.numeric_errors, 1);
        assert_eq!(stats.emissions, 1);
    }

    #[test]
    fn test_zero_volume_skips_emission_only() {
        let mut ingest = ingest(2);
        let processed = ingest
            .process(&update("BTC-USD", &[("10", "0"), ("20", "0"), ("30", "2")]))
            .unwrap();

        let emissions = processed.emissions();
        assert_eq!(emissions.len(), 1);
        assert!((emissions[0].vwap - 30.0).abs() < EPS);
        assert_eq!(emissions[0].window_len, 2);
        assert_eq!(ingest.stats().zero_volume_skips, 2);
        assert_eq!(ingest.stats().accepted_changes, 3);
    }

    #[test]
    fn test_notices_do_not_aggregate() {
        let mut ingest = ingest(3);

        let ack = ingest
            .process(
                br#"{"type":"subscriptions","channels":[{"name":"level2","product_ids":["ETH-BTC","BTC-USD"]}]}"#,
            )
            .unwrap();
        assert!(matches!(ack, Processed::Subscriptions(_)));

        let err = ingest
            .process(br#"{"type":"error","message":"Failed to subscribe","reason":"ETH-USD is not a valid product"}"#)
            .unwrap();
        assert!(matches!(err, Processed::Error(_)));

        let snap = ingest
            .process(br#"{"type":"snapshot","product_id":"BTC-USD","asks":[["1","1"]],"bids":[]}"#)
            .unwrap();
        assert!(matches!(snap, Processed::Snapshot(_)));

        assert!(ingest.registry().is_empty());
        assert_eq!(ingest.stats().notices, 3);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(PAYLOAD_PREVIEW_LEN + 10);
        let p = preview(long.as_bytes());
        assert_eq!(p.len(), PAYLOAD_PREVIEW_LEN + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview(b"short"), "short");
    }

    #[tokio::test]
    async fn test_run_until_channel_closed() {
        let mut ingest = ingest(3);
        let (tx, rx) = mpsc::channel(16);

        for payload in [
            String::from_utf8(update("BTC-USD", &[("1", "1")])).unwrap(),
            "garbage".to_string(),
            String::from_utf8(update("BTC-USD", &[("2", "1")])).unwrap(),
        ] {
            tx.send(payload).await.unwrap();
        }
        drop(tx);

        let stats = ingest.run(rx, CancellationToken::new()).await;
        assert_eq!(stats.payloads, 3);
        assert_eq!(stats.emissions, 2);
        assert_eq!(stats.decode_errors, 1);
        assert_eq!(ingest.registry().get("BTC-USD").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut ingest = ingest(3).with_stats_reporter(
            StatsReporter::new(vec!["BTC-USD".to_string()]),
            Duration::from_secs(60),
        );
        let (_tx, rx) = mpsc::channel::<String>(16);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = tokio_test::assert_ok!(
            tokio::time::timeout(Duration::from_secs(1), ingest.run(rx, shutdown)).await
        );
        assert_eq!(stats.payloads, 0);
    }
}
