//! # Count Window
//! Sliding count window over call outcomes (size 30, slide 1).
//!
//! Keeps the last `size` dropped-flags for a single cell in arrival order and
//! running totals next to them. Every `push` past the window size evicts the
//! oldest flag, so once full the totals always describe exactly `size` calls.
//!
//! `DropCounts` is the mergeable part of the accumulator: partial counts from
//! independently processed slices of a stream combine with `merge`. History is
//! never merged; eviction only makes sense along one linear stream.

use std::collections::VecDeque;

use crate::record::CallEvent;

/// Calls per window.
pub const WINDOW_SIZE: usize = 30;

/// `(total, dropped)` pair backing a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub total: u64,
    pub dropped: u64,
}

impl DropCounts {
    pub fn new(total: u64, dropped: u64) -> Self {
        Self { total, dropped }
    }

    /// Combine two partial accumulators. Associative and commutative.
    pub fn merge(self, other: DropCounts) -> DropCounts {
        DropCounts {
            total: self.total + other.total,
            dropped: self.dropped + other.dropped,
        }
    }

    /// `dropped / total`, or `None` for an empty accumulator.
    pub fn drop_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.dropped as f64 / self.total as f64)
    }
}

/// Per-cell ring of recent outcomes.
#[derive(Debug, Clone)]
pub struct WindowAccumulator {
    size: usize,
    history: VecDeque<bool>,
    counts: DropCounts,
}

impl Default for WindowAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowAccumulator {
    pub fn new() -> Self {
        Self::with_size(WINDOW_SIZE)
    }

    /// `size` is clamped to at least 1.
    pub fn with_size(size: usize) -> Self {
        let size = size.max(1);
        Self {
            size,
            history: VecDeque::with_capacity(size + 1),
            counts: DropCounts::default(),
        }
    }

    pub fn add(&mut self, event: &CallEvent) {
        self.push(event.is_dropped);
    }

    /// Append one outcome, evicting the oldest once the window overflows.
    pub fn push(&mut self, dropped: bool) {
        self.history.push_back(dropped);
        self.counts.total += 1;
        if dropped {
            self.counts.dropped += 1;
        }

        while self.history.len() > self.size {
            if let Some(evicted) = self.history.pop_front() {
                self.counts.total -= 1;
                if evicted {
                    self.counts.dropped -= 1;
                }
            }
        }
    }

    pub fn counts(&self) -> DropCounts {
        self.counts
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_full(&self) -> bool {
        self.history.len() == self.size
    }

    /// Drop rate over the full window. `None` until `size` calls were seen.
    pub fn result(&self) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        self.counts.drop_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(acc: &mut WindowAccumulator, flags: &[bool]) {
        for &f in flags {
            acc.push(f);
        }
    }

    #[test]
    fn totals_track_history_until_full() {
        let mut acc = WindowAccumulator::new();
        for i in 0..WINDOW_SIZE - 1 {
            acc.push(i % 4 == 0);
            assert!(acc.result().is_none());
        }
        acc.push(false);
        assert!(acc.is_full());
        assert_eq!(acc.counts().total, WINDOW_SIZE as u64);
        assert_eq!(acc.counts().dropped, 8);
    }

    #[test]
    fn eviction_keeps_window_pinned() {
        let mut acc = WindowAccumulator::with_size(3);
        fill(&mut acc, &[true, false, false]);
        assert_eq!(acc.counts(), DropCounts::new(3, 1));

        // oldest (dropped) leaves, new non-dropped arrives
        acc.push(false);
        assert_eq!(acc.counts(), DropCounts::new(3, 0));

        acc.push(true);
        acc.push(true);
        assert_eq!(acc.counts(), DropCounts::new(3, 2));
        assert_eq!(acc.result(), Some(2.0 / 3.0));
    }

    #[test]
    fn dropped_never_exceeds_total() {
        let mut acc = WindowAccumulator::with_size(5);
        for i in 0..100 {
            acc.push(i % 3 != 0);
            let c = acc.counts();
            assert!(c.dropped <= c.total);
            assert!(c.total <= 5);
        }
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let a = DropCounts::new(30, 3);
        let b = DropCounts::new(12, 7);
        let c = DropCounts::new(5, 0);
        assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
        assert_eq!(a.merge(b), b.merge(a));
        assert_eq!(a.merge(DropCounts::default()), a);
    }

    #[test]
    fn empty_counts_have_no_rate() {
        assert_eq!(DropCounts::default().drop_rate(), None);
        assert_eq!(DropCounts::new(4, 1).drop_rate(), Some(0.25));
    }
}
