//! Message parsing for the level2 feed.
//!
//! Every inbound payload is a JSON object whose `type` field selects exactly
//! one variant of [`RawMessage`]. Because the discriminator picks the shape,
//! a payload can never match two variants and no trial-parse ordering is
//! needed. Variants are declared in expected-frequency order only.
//!
//! After the structural parse each variant is checked for its required
//! non-empty fields; a payload that fails either step is `Unparseable`.

use crate::error::{FeedError, FeedResult};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;
use vwap_core::PriceVolumeSample;

/// Counters for decoded and rejected payloads.
#[derive(Debug, Default)]
pub struct DecodeStats {
    pub decoded_count: AtomicU64,
    pub rejected_count: AtomicU64,
}

impl DecodeStats {
    pub fn record_decoded(&self) {
        self.decoded_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decoded(&self) -> u64 {
        self.decoded_count.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }
}

/// Order book update.
/// Format: {"type":"l2update","product_id":"BTC-USD","changes":[["sell","45632.17","522.05"]]}
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawUpdate {
    pub product_id: String,
    /// `[side, price, size]`, all strings.
    pub changes: Vec<(String, String, String)>,
}

/// Server-side error report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorNotice {
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Subscription confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionsAck {
    pub channels: Vec<Channel>,
}

/// One subscribed channel inside a [`SubscriptionsAck`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Channel {
    pub name: String,
    #[serde(default)]
    pub product_ids: Vec<String>,
}

/// Full book snapshot. Levels are carried but not aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SnapshotNotice {
    pub product_id: String,
    #[serde(default)]
    pub asks: Vec<Vec<String>>,
    #[serde(default)]
    pub bids: Vec<Vec<String>>,
}

/// Inbound message, selected by the `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum RawMessage {
    #[serde(rename = "l2update")]
    Update(RawUpdate),
    #[serde(rename = "error")]
    Error(ErrorNotice),
    #[serde(rename = "subscriptions")]
    Subscriptions(SubscriptionsAck),
    #[serde(rename = "snapshot")]
    Snapshot(SnapshotNotice),
}

impl RawMessage {
    /// Metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Error(_) => "error",
            Self::Subscriptions(_) => "subscriptions",
            Self::Snapshot(_) => "snapshot",
        }
    }

    /// Check the required non-empty fields of each variant.
    fn validate(&self) -> FeedResult<()> {
        let missing = match self {
            Self::Update(u) if u.product_id.is_empty() => Some("l2update without product_id"),
            Self::Error(e) if e.message.is_empty() => Some("error without message"),
            Self::Subscriptions(s) if s.channels.is_empty() => {
                Some("subscriptions without channels")
            }
            Self::Snapshot(s) if s.product_id.is_empty() => Some("snapshot without product_id"),
            _ => None,
        };
        match missing {
            Some(msg) => Err(FeedError::Unparseable(msg.to_string())),
            None => Ok(()),
        }
    }
}

/// A single typed book change. The side is not retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateChange {
    pub price: f64,
    pub volume: f64,
}

impl From<UpdateChange> for PriceVolumeSample {
    fn from(change: UpdateChange) -> Self {
        PriceVolumeSample::new(change.price, change.volume)
    }
}

/// Update with numeric changes.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedUpdate {
    pub product_id: String,
    pub changes: Vec<UpdateChange>,
}

/// Fully parsed message with updates already translated.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    Update(TypedUpdate),
    Error(ErrorNotice),
    Subscriptions(SubscriptionsAck),
    Snapshot(SnapshotNotice),
}

impl FeedMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Update(_) => "update",
            Self::Error(_) => "error",
            Self::Subscriptions(_) => "subscriptions",
            Self::Snapshot(_) => "snapshot",
        }
    }
}

/// Converts string-encoded change tuples into numbers.
pub struct UpdateTranslator;

impl UpdateTranslator {
    /// Translate every change of `raw`.
    ///
    /// The first price or size that is not a finite number aborts the whole
    /// update with `FeedError::NumericParse`; no partial result is returned.
    pub fn translate(raw: RawUpdate) -> FeedResult<TypedUpdate> {
        let changes = raw
            .changes
            .iter()
            .map(|(_side, price, size)| {
                Ok(UpdateChange {
                    price: parse_number("price", price)?,
                    volume: parse_number("volume", size)?,
                })
            })
            .collect::<FeedResult<Vec<_>>>()?;

        Ok(TypedUpdate {
            product_id: raw.product_id,
            changes,
        })
    }
}

fn parse_number(field: &'static str, value: &str) -> FeedResult<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(FeedError::NumericParse {
            field,
            value: value.to_string(),
        }),
    }
}

/// Payload decoder.
#[derive(Debug, Default)]
pub struct MessageDecoder {
    stats: DecodeStats,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &DecodeStats {
        &self.stats
    }

    /// Classify a raw payload.
    pub fn decode(&self, payload: &[u8]) -> FeedResult<RawMessage> {
        let result = Self::decode_inner(payload);
        match &result {
            Ok(msg) => {
                self.stats.record_decoded();
                trace!(kind = msg.kind(), "Decoded payload");
            }
            Err(_) => self.stats.record_rejected(),
        }
        result
    }

    /// Decode and translate update payloads into [`FeedMessage::Update`].
    pub fn parse(&self, payload: &[u8]) -> FeedResult<FeedMessage> {
        Ok(match self.decode(payload)? {
            RawMessage::Update(raw) => FeedMessage::Update(UpdateTranslator::translate(raw)?),
            RawMessage::Error(e) => FeedMessage::Error(e),
            RawMessage::Subscriptions(s) => FeedMessage::Subscriptions(s),
            RawMessage::Snapshot(s) => FeedMessage::Snapshot(s),
        })
    }

    fn decode_inner(payload: &[u8]) -> FeedResult<RawMessage> {
        // Internally tagged enums also accept sequences; only objects are valid.
        match payload.iter().copied().find(|b| !b.is_ascii_whitespace()) {
            None => return Err(FeedError::Unparseable("empty payload".to_string())),
            Some(b'{') => {}
            Some(_) => return Err(FeedError::Unparseable("not a JSON object".to_string())),
        }

        let msg: RawMessage =
            serde_json::from_slice(payload).map_err(|e| FeedError::Unparseable(e.to_string()))?;
        msg.validate()?;
        Ok(msg)
    }
}
