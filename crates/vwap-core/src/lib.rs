//! Core aggregation types for ws-vwap.
//!
//! This crate provides the building blocks of the aggregation engine:
//! - `PriceVolumeSample`: the (price, volume) datum stored per observation
//! - `SlidingWindow`: fixed-capacity, order-preserving circular store
//! - `compute_vwap`: volume-weighted average price over a window

pub mod error;
pub mod sample;
pub mod vwap;
pub mod window;

pub use error::{CoreError, CoreResult};
pub use sample::PriceVolumeSample;
pub use vwap::{compute_vwap, VwapAccumulator};
pub use window::{SlidingWindow, WindowIter};
