//! Deterministic pseudo-random number generator.
//!
//! A small xorshift64 PRNG. Seeded explicitly it reproduces the same delay
//! sequence run after run, which makes a fuzz run repeatable; seeded from
//! entropy it perturbs differently every run. It is NOT cryptographically
//! secure and not thread-safe by itself; concurrent users guard it with a
//! mutex of their own.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A deterministic PRNG using xorshift64.
#[derive(Debug, Clone)]
pub struct DetRng {
    state: u64,
}

impl DetRng {
    /// Creates a PRNG with the given seed. A zero seed is replaced with 1.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Creates a PRNG seeded from wall-clock entropy.
    #[must_use]
    pub fn from_entropy() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_nanos() as u64;
        let stack_probe = 0u8;
        Self::new(nanos ^ (core::ptr::addr_of!(stack_probe) as u64))
    }

    /// Generates the next pseudo-random u64 value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generates a value in `[0, bound)` using rejection sampling to avoid
    /// modulo bias.
    ///
    /// # Panics
    ///
    /// Panics if `bound` is zero.
    #[inline]
    pub fn next_u64_below(&mut self, bound: u64) -> u64 {
        assert!(bound > 0, "bound must be non-zero");
        let threshold = u64::MAX - (u64::MAX % bound);
        loop {
            let value = self.next_u64();
            if value < threshold {
                return value % bound;
            }
        }
    }

    /// Draws a percentage in `[0, 100)`.
    #[inline]
    pub fn next_percent(&mut self) -> u32 {
        self.next_u64_below(100) as u32
    }

    /// Draws a duration uniformly from `range`, inclusive at both ends.
    ///
    /// Equal bounds draw exactly that bound without touching the generator.
    ///
    /// # Panics
    ///
    /// Panics if the range is inverted.
    pub fn duration_in(&mut self, range: std::ops::RangeInclusive<Duration>) -> Duration {
        let (min, max) = (*range.start(), *range.end());
        assert!(min <= max, "inverted duration range");
        if min == max {
            return min;
        }
        let span = (max - min).as_nanos() as u64;
        min + Duration::from_nanos(self.next_u64_below(span + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = DetRng::new(42);
        let mut b = DetRng::new(42);
        for _ in 0..64 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut rng = DetRng::new(0);
        for _ in 0..64 {
            rng.next_u64();
            assert_ne!(rng.state, 0);
        }
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let mut rng = DetRng::new(7);
        for _ in 0..1000 {
            assert!(rng.next_u64_below(10) < 10);
            assert!(rng.next_percent() < 100);
        }
    }

    #[test]
    fn duration_draws_are_inclusive() {
        let mut rng = DetRng::new(11);
        let min = Duration::from_millis(2);
        let max = Duration::from_millis(9);
        for _ in 0..1000 {
            let d = rng.duration_in(min..=max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(rng.duration_in(min..=min), min);
    }

    #[test]
    fn percent_covers_full_range() {
        let mut rng = DetRng::new(3);
        let mut seen = [false; 100];
        for _ in 0..10_000 {
            seen[rng.next_percent() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
