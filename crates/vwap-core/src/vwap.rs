//! Volume-weighted average price over a sliding window.

use crate::error::{CoreError, CoreResult};
use crate::sample::PriceVolumeSample;
use crate::window::SlidingWindow;

/// Running sums for a VWAP fold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VwapAccumulator {
    /// Σ price * volume.
    pub price_volume: f64,
    /// Σ volume.
    pub volume: f64,
}

impl VwapAccumulator {
    /// Fold step: add one sample.
    #[must_use]
    pub fn add(self, sample: &PriceVolumeSample) -> Self {
        Self {
            price_volume: self.price_volume + sample.notional(),
            volume: self.volume + sample.volume,
        }
    }

    /// Final ratio.
    ///
    /// Returns `CoreError::ZeroVolume` when no volume was accumulated, so a
    /// non-finite price never reaches callers.
    pub fn value(&self) -> CoreResult<f64> {
        if self.volume == 0.0 {
            return Err(CoreError::ZeroVolume);
        }
        Ok(self.price_volume / self.volume)
    }
}

/// Compute the VWAP of all samples currently in `window`.
///
/// # Errors
/// - `CoreError::EmptyWindow` if the window has no samples
/// - `CoreError::ZeroVolume` if every sample has zero volume
pub fn compute_vwap(window: &SlidingWindow) -> CoreResult<f64> {
    window
        .fold(VwapAccumulator::default(), VwapAccumulator::add)?
        .value()
}
