//! Dubious change detection.

use crate::parser::UpdateChange;

/// Sentinel price the sandbox feed is known to publish as filler.
pub const DEFAULT_SENTINEL_PRICE: f64 = 100.0;

/// Decides whether a change is excluded from aggregation.
pub trait ChangeFilter {
    fn is_dubious(&self, change: &UpdateChange) -> bool;
}

impl<F> ChangeFilter for F
where
    F: Fn(&UpdateChange) -> bool,
{
    fn is_dubious(&self, change: &UpdateChange) -> bool {
        self(change)
    }
}

/// Flags changes whose price equals one of the sentinel prices.
#[derive(Debug, Clone, PartialEq)]
pub struct DubiousFilter {
    enabled: bool,
    sentinel_prices: Vec<f64>,
}

impl DubiousFilter {
    pub fn new(enabled: bool, sentinel_prices: Vec<f64>) -> Self {
        Self {
            enabled,
            sentinel_prices,
        }
    }

    /// A filter that accepts everything.
    pub fn disabled() -> Self {
        Self::new(false, Vec::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sentinel_prices(&self) -> &[f64] {
        &self.sentinel_prices
    }
}

impl Default for DubiousFilter {
    fn default() -> Self {
        Self::new(true, vec![DEFAULT_SENTINEL_PRICE])
    }
}

impl ChangeFilter for DubiousFilter {
    fn is_dubious(&self, change: &UpdateChange) -> bool {
        self.enabled && self.sentinel_prices.contains(&change.price)
    }
}
