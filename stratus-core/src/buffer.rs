//! Fixed-Size Sample History for the Trend Predictor
//!
//! ## Overview
//!
//! The predictor only ever needs the most recent N samples, in the order they
//! were recorded. `SampleRing` keeps exactly that: a ring of `Sample`s whose
//! capacity is a compile-time constant, so the history never allocates and
//! never grows past N.
//!
//! ## Eviction
//!
//! Pushing into a full ring overwrites the oldest sample. Recent data is worth
//! more than old data for a short-horizon estimator, so overflow is never an
//! error:
//!
//! ```text
//! SampleRing<3> after pushing 1, 2, 3, 4:
//! ┌─────┬─────┬─────┐
//! │  4  │  2  │  3  │  ← physical slots
//! └─────┴─────┴─────┘
//!          ↑
//!          └── write_pos = 1, oldest = 2
//!
//! Logical (chronological) view: [2, 3, 4]
//! ```
//!
//! ## Performance
//!
//! - `push()`: O(1), one slot write and a modulo
//! - `last()` / `get()`: O(1)
//! - `iter()`: O(n), oldest to newest
//!
//! ## Usage Example
//!
//! ```rust
//! use stratus_core::buffer::{Sample, SampleRing};
//!
//! let mut history: SampleRing<3> = SampleRing::new();
//! for (i, value) in [19.0, 19.1, 19.2, 19.3].into_iter().enumerate() {
//!     history.push(Sample::new(value, i as u64 * 5000));
//! }
//!
//! assert_eq!(history.len(), 3);
//! assert_eq!(history.get(0).map(|s| s.value), Some(19.1));
//! assert_eq!(history.last().map(|s| s.value), Some(19.3));
//! ```

use crate::time::Timestamp;

/// A timestamped scalar reading. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample {
    /// Reading value (°C for the temperature history)
    pub value: f32,
    /// When the reading was taken, in milliseconds
    pub timestamp: Timestamp,
}

impl Sample {
    /// Create a sample
    pub const fn new(value: f32, timestamp: Timestamp) -> Self {
        Self { value, timestamp }
    }
}

/// Fixed-capacity ring of samples with oldest-first eviction
///
/// ## Internal Invariants
///
/// - `write_pos < N` (next write position is always valid)
/// - `len <= N` (never claim to have more items than capacity)
/// - Logical index 0 is always the oldest retained sample
///
/// ## Thread Safety
///
/// Not synchronized. The predictor that owns it is driven by the telemetry
/// loop alone.
#[derive(Clone)]
pub struct SampleRing<const N: usize> {
    /// Storage slots; `None` until first written
    data: [Option<Sample>; N],

    /// Index where the next write will occur
    write_pos: usize,

    /// Current number of valid samples
    len: usize,
}

impl<const N: usize> SampleRing<N> {
    /// Creates a new empty ring
    pub const fn new() -> Self {
        Self {
            data: [None; N],
            write_pos: 0,
            len: 0,
        }
    }

    /// Maximum number of samples retained
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Adds a sample, overwriting the oldest one when full
    pub fn push(&mut self, sample: Sample) {
        if N == 0 {
            return;
        }

        self.data[self.write_pos] = Some(sample);
        self.write_pos = (self.write_pos + 1) % N;

        if self.len < N {
            self.len += 1;
        }
    }

    /// Number of stored samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if ring is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if ring is full
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    /// Most recent sample
    pub fn last(&self) -> Option<&Sample> {
        if self.is_empty() {
            return None;
        }

        let idx = if self.write_pos == 0 { N - 1 } else { self.write_pos - 1 };
        self.data[idx].as_ref()
    }

    /// Sample by logical index (0 = oldest, len-1 = newest)
    ///
    /// When the ring is full the oldest sample sits at `write_pos`, so the
    /// logical index is offset from there.
    pub fn get(&self, index: usize) -> Option<&Sample> {
        if index >= self.len {
            return None;
        }

        let actual_index = if self.len < N {
            index
        } else {
            (self.write_pos + index) % N
        };

        self.data[actual_index].as_ref()
    }

    /// Iterate over samples from oldest to newest
    pub fn iter(&self) -> SampleRingIter<'_, N> {
        SampleRingIter {
            ring: self,
            index: 0,
        }
    }

    /// Drop every sample
    pub fn clear(&mut self) {
        self.data = [None; N];
        self.write_pos = 0;
        self.len = 0;
    }
}

/// Iterator over ring contents, oldest first
pub struct SampleRingIter<'a, const N: usize> {
    ring: &'a SampleRing<N>,
    index: usize,
}

impl<'a, const N: usize> Iterator for SampleRingIter<'a, N> {
    type Item = &'a Sample;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.ring.get(self.index)?;
        self.index += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.ring.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<const N: usize> Default for SampleRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring() {
        let ring: SampleRing<5> = SampleRing::new();
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.capacity(), 5);
        assert!(ring.last().is_none());
        assert!(ring.get(0).is_none());
    }

    #[test]
    fn push_and_retrieve() {
        let mut ring = SampleRing::<5>::new();
        ring.push(Sample::new(25.0, 1000));

        assert_eq!(ring.len(), 1);
        let last = ring.last().unwrap();
        assert_eq!(last.value, 25.0);
        assert_eq!(last.timestamp, 1000);
    }

    #[test]
    fn oldest_first_eviction() {
        let mut ring = SampleRing::<3>::new();

        for i in 0..5 {
            ring.push(Sample::new(i as f32, i as u64 * 1000));
        }

        assert_eq!(ring.len(), 3);
        assert!(ring.is_full());

        // 0 and 1 were overwritten
        let values: Vec<f32> = ring.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(ring.last().unwrap().value, 4.0);
    }

    #[test]
    fn clear_then_reuse() {
        let mut ring = SampleRing::<2>::new();
        ring.push(Sample::new(1.0, 0));
        ring.push(Sample::new(2.0, 1));
        ring.push(Sample::new(3.0, 2));
        ring.clear();

        assert!(ring.is_empty());
        ring.push(Sample::new(9.0, 3));
        let values: Vec<f32> = ring.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![9.0]);
    }

    #[test]
    fn zero_capacity_ring_stays_empty() {
        let mut ring = SampleRing::<0>::new();
        ring.push(Sample::new(1.0, 0));
        assert!(ring.is_empty());
        assert!(ring.last().is_none());
    }

    #[test]
    fn iterator_reports_exact_size() {
        let mut ring = SampleRing::<4>::new();
        for i in 0..6 {
            ring.push(Sample::new(i as f32, i));
        }
        let iter = ring.iter();
        assert_eq!(iter.size_hint(), (4, Some(4)));
        let timestamps: Vec<u64> = ring.iter().map(|s| s.timestamp).collect();
        assert_eq!(timestamps, vec![2, 3, 4, 5]);
    }
}
