//! Price/volume observation stored in a sliding window.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single (price, volume) observation.
///
/// Samples carry no identity beyond their position in a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceVolumeSample {
    pub price: f64,
    pub volume: f64,
}

impl PriceVolumeSample {
    pub fn new(price: f64, volume: f64) -> Self {
        Self { price, volume }
    }

    /// Price multiplied by volume.
    pub fn notional(&self) -> f64 {
        self.price * self.volume
    }
}

impl From<(f64, f64)> for PriceVolumeSample {
    fn from((price, volume): (f64, f64)) -> Self {
        Self::new(price, volume)
    }
}

impl fmt::Display for PriceVolumeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.price, self.volume)
    }
}
