//! Fixed-capacity rolling history of scalar samples.

use std::collections::VecDeque;

/// A bounded FIFO of the most recent samples of one metric.
///
/// Appending to a full series evicts the oldest sample first, so `len()` never
/// exceeds `capacity()`. Not synchronized; the engine guards it with its lock.
#[derive(Debug, Clone)]
pub struct HistorySeries {
    values: VecDeque<f64>,
    capacity: usize,
}

impl HistorySeries {
    /// Create an empty series. A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one when full.
    #[inline]
    pub fn append(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// Samples in insertion order, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Most recent sample.
    pub fn latest(&self) -> Option<f64> {
        self.values.back().copied()
    }

    /// Arithmetic mean of the stored samples.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_overflow_keeps_newest() {
        let mut series = HistorySeries::new(60);
        for i in 1..=65 {
            series.append(i as f64);
            assert!(series.len() <= 60);
        }

        let expected: Vec<f64> = (6..=65).map(|i| i as f64).collect();
        assert_eq!(series.values(), expected);
        assert_eq!(series.latest(), Some(65.0));
    }

    #[test]
    fn test_mean() {
        let mut series = HistorySeries::new(4);
        assert_eq!(series.mean(), None);

        for v in [10.0, 20.0, 30.0, 40.0, 50.0] {
            series.append(v);
        }
        // 10.0 has been evicted
        assert_eq!(series.mean(), Some(35.0));
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let mut series = HistorySeries::new(0);
        series.append(1.0);
        series.append(2.0);
        assert_eq!(series.capacity(), 1);
        assert_eq!(series.values(), vec![2.0]);
    }

    proptest! {
        #[test]
        fn prop_length_bounded(capacity in 1usize..80, samples in proptest::collection::vec(0.0f64..100.0, 0..200)) {
            let mut series = HistorySeries::new(capacity);
            for (i, v) in samples.iter().enumerate() {
                series.append(*v);
                prop_assert!(series.len() <= capacity);
                prop_assert_eq!(series.len(), (i + 1).min(capacity));
            }

            let tail_start = samples.len().saturating_sub(capacity);
            prop_assert_eq!(series.values(), samples[tail_start..].to_vec());
        }
    }
}
