//! Per-instrument window registry.
//!
//! Windows are created on first use with the configured capacity and are
//! never removed, so the registry grows with the number of distinct
//! instruments seen. The registry is owned by a single ingestion loop and
//! needs no locking.

use std::collections::HashMap;
use vwap_core::{CoreResult, SlidingWindow};

#[derive(Debug)]
pub struct WindowRegistry {
    /// Empty window cloned for every new instrument.
    template: SlidingWindow,
    windows: HashMap<String, SlidingWindow>,
}

impl WindowRegistry {
    /// Returns `CoreError::ZeroCapacity` if `capacity` is zero.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        Ok(Self {
            template: SlidingWindow::new(capacity)?,
            windows: HashMap::new(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.template.capacity()
    }

    /// Window for `product_id`, created empty if absent.
    pub fn get_or_create(&mut self, product_id: &str) -> &mut SlidingWindow {
        self.windows
            .entry(product_id.to_string())
            .or_insert_with(|| self.template.clone())
    }

    pub fn get(&self, product_id: &str) -> Option<&SlidingWindow> {
        self.windows.get(product_id)
    }

    /// Number of instruments with a window.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Instruments with a window, sorted.
    pub fn product_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.windows.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vwap_core::{CoreError, PriceVolumeSample};

    #[test]
    fn test_zero_capacity_rejected() {
        assert_eq!(WindowRegistry::new(0).unwrap_err(), CoreError::ZeroCapacity);
    }

    #[test]
    fn test_get_or_create_is_lazy_and_stable() {
        let mut registry = WindowRegistry::new(2).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get("BTC-USD").is_none());

        registry
            .get_or_create("BTC-USD")
            .push(PriceVolumeSample::new(1.0, 1.0));
        registry
            .get_or_create("BTC-USD")
            .push(PriceVolumeSample::new(2.0, 1.0));
        registry
            .get_or_create("ETH-USD")
            .push(PriceVolumeSample::new(3.0, 1.0));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("BTC-USD").unwrap().len(), 2);
        assert_eq!(registry.get("ETH-USD").unwrap().len(), 1);
        assert_eq!(registry.get("ETH-USD").unwrap().capacity(), 2);
        assert_eq!(registry.product_ids(), vec!["BTC-USD", "ETH-USD"]);
    }
}
