//! Streaming VWAP calculator.
//!
//! Wires the components together:
//! - WebSocket connection to the level2 feed
//! - Payload decoding and dubious-change filtering
//! - Per-instrument sliding windows and VWAP emission
//! - Periodic statistics and graceful shutdown

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::{AppConfig, ConfigOverrides};
pub use error::{AppError, AppResult};
