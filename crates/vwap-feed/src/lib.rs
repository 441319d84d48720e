//! level2 feed ingestion for ws-vwap.
//!
//! Decodes raw WebSocket payloads into typed messages, filters dubious
//! changes and feeds accepted ones into per-instrument sliding windows,
//! emitting a VWAP after every push.

pub mod error;
pub mod filter;
pub mod ingest;
pub mod parser;
pub mod registry;
pub mod stats;

pub use error::{FeedError, FeedResult};
pub use filter::{ChangeFilter, DubiousFilter, DEFAULT_SENTINEL_PRICE};
pub use ingest::{IngestionLoop, Processed, VwapEmission};
pub use parser::{
    Channel, DecodeStats, ErrorNotice, FeedMessage, MessageDecoder, RawMessage, RawUpdate,
    SnapshotNotice, SubscriptionsAck, TypedUpdate, UpdateChange, UpdateTranslator,
};
pub use registry::WindowRegistry;
pub use stats::IngestStats;
