//! Fixed-capacity sliding window of price/volume samples.
//!
//! The window is a ring buffer: `push` writes at the cursor and advances it
//! modulo capacity, overwriting the oldest sample once the window is full.
//! Reads walk the valid samples oldest-first:
//!
//! - not yet full: `[0, len)`
//! - full: `[cursor, capacity)` followed by `[0, cursor)`
//!
//! Entries before the cursor are the most recent only after the window
//! has wrapped at least once.

use crate::error::{CoreError, CoreResult};
use crate::sample::PriceVolumeSample;
use std::iter::Chain;
use std::slice;

/// Order-preserving circular store of samples.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    storage: Box<[PriceVolumeSample]>,
    /// Next write position, always in `0..capacity`.
    cursor: usize,
    /// Number of valid samples, `min(total_pushes, capacity)`.
    len: usize,
}

impl SlidingWindow {
    /// Create an empty window.
    ///
    /// Returns `CoreError::ZeroCapacity` if `capacity` is zero.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::ZeroCapacity);
        }
        Ok(Self {
            storage: vec![PriceVolumeSample::default(); capacity].into_boxed_slice(),
            cursor: 0,
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once `capacity` samples have been pushed.
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// Evicted samples are dropped silently. Callers that need the evicted
    /// value must read it before pushing.
    pub fn push(&mut self, sample: PriceVolumeSample) {
        self.storage[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<&PriceVolumeSample> {
        if self.is_empty() {
            return None;
        }
        let idx = (self.cursor + self.capacity() - 1) % self.capacity();
        Some(&self.storage[idx])
    }

    /// The valid samples as (older, newer) slices in chronological order.
    fn segments(&self) -> (&[PriceVolumeSample], &[PriceVolumeSample]) {
        if self.is_full() {
            let (newer, older) = self.storage.split_at(self.cursor);
            (older, newer)
        } else {
            (&self.storage[..self.len], &[])
        }
    }

    /// Iterate valid samples oldest-first.
    pub fn iter(&self) -> WindowIter<'_> {
        let (older, newer) = self.segments();
        WindowIter {
            inner: older.iter().chain(newer.iter()),
        }
    }

    /// Left fold over the samples in chronological order.
    ///
    /// Returns `CoreError::EmptyWindow` if nothing has been pushed yet.
    pub fn fold<A, F>(&self, init: A, f: F) -> CoreResult<A>
    where
        F: FnMut(A, &PriceVolumeSample) -> A,
    {
        if self.is_empty() {
            return Err(CoreError::EmptyWindow);
        }
        Ok(self.iter().fold(init, f))
    }

    /// Materialize the window oldest-first.
    pub fn read(&self) -> CoreResult<Vec<PriceVolumeSample>> {
        self.fold(Vec::with_capacity(self.len), |mut acc, sample| {
            acc.push(*sample);
            acc
        })
    }
}

/// Chronological iterator over a window's samples.
pub struct WindowIter<'a> {
    inner: Chain<slice::Iter<'a, PriceVolumeSample>, slice::Iter<'a, PriceVolumeSample>>,
}

impl<'a> Iterator for WindowIter<'a> {
    type Item = &'a PriceVolumeSample;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for WindowIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<'a> IntoIterator for &'a SlidingWindow {
    type Item = &'a PriceVolumeSample;
    type IntoIter = WindowIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
