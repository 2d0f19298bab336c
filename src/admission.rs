//! # Admission Counter
//! Lock-free count of currently active calls with an optional ceiling.
//!
//! Shared by the emission ticker (increments), the call-termination ticker
//! (decrements) and the control surface (reset). Decrement is clamped at
//! zero, so any interleaving of the three keeps `active >= 0`.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct AdmissionCounter {
    active: AtomicU64,
    /// `<= 0` means unbounded.
    ceiling: i64,
}

impl AdmissionCounter {
    pub fn new(ceiling: i64) -> Self {
        Self {
            active: AtomicU64::new(0),
            ceiling,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(-1)
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    pub fn get(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Record an accepted call. Returns the new count.
    pub fn increment(&self) -> u64 {
        self.active.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// End one call. Returns `false` when there was nothing to end.
    pub fn decrement(&self) -> bool {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
            .is_ok()
    }

    pub fn reset(&self) {
        self.active.store(0, Ordering::SeqCst);
    }

    pub fn is_at_ceiling(&self) -> bool {
        self.ceiling > 0 && self.get() >= self.ceiling as u64
    }

    /// Check the ceiling and increment in one atomic step.
    /// Returns `false` (and leaves the count alone) when at the ceiling.
    pub fn try_admit(&self) -> bool {
        if self.ceiling <= 0 {
            self.increment();
            return true;
        }
        let ceiling = self.ceiling as u64;
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                (v < ceiling).then_some(v + 1)
            })
            .is_ok()
    }
}

impl Default for AdmissionCounter {
    fn default() -> Self {
        Self::unbounded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrement_clamps_at_zero() {
        let c = AdmissionCounter::unbounded();
        c.increment();
        c.increment();
        let mut ended = 0;
        for _ in 0..10 {
            if c.decrement() {
                ended += 1;
            }
            assert!(c.get() <= 2);
        }
        assert_eq!(ended, 2);
        assert_eq!(c.get(), 0);
    }

    #[test]
    fn ceiling_semantics() {
        let c = AdmissionCounter::new(5);
        for _ in 0..5 {
            assert!(!c.is_at_ceiling());
            c.increment();
        }
        assert!(c.is_at_ceiling());
        assert!(!c.try_admit());
        assert_eq!(c.get(), 5);

        c.decrement();
        assert!(c.try_admit());
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn non_positive_ceiling_is_unbounded() {
        for ceiling in [0, -1, -100] {
            let c = AdmissionCounter::new(ceiling);
            for _ in 0..1000 {
                assert!(c.try_admit());
            }
            assert!(!c.is_at_ceiling());
        }
    }

    #[test]
    fn reset_zeroes() {
        let c = AdmissionCounter::new(3);
        c.increment();
        c.increment();
        c.reset();
        assert_eq!(c.get(), 0);
        assert!(!c.decrement());
    }
}
