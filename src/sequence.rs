//! Wrapping sequence counter used to correlate calls with their replies.
//!
//! Each connection owns one [`SequenceCounter`] for its outbound direction.
//! Values are unique only among calls that are in flight at the same time;
//! once the counter reaches its maximum it wraps back to the minimum.

/// Monotonic counter over the inclusive range `min..=max`.
///
/// A fresh counter starts "exhausted" so that the first call to
/// [`next`](Self::next) yields `min`.
///
/// # Examples
///
/// ```
/// use callwire::sequence::SequenceCounter;
///
/// let mut counter = SequenceCounter::new(1, 3);
/// let drawn: Vec<u32> = (0..5).map(|_| counter.next()).collect();
/// assert_eq!(drawn, [1, 2, 3, 1, 2]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceCounter {
    min: u32,
    max: u32,
    last: u32,
}

impl SequenceCounter {
    /// Create a counter yielding values in `min..=max`.
    ///
    /// If `max < min` the range collapses to the single value `min`.
    #[must_use]
    pub const fn new(min: u32, max: u32) -> Self {
        let max = if max < min { min } else { max };
        Self {
            min,
            max,
            last: max,
        }
    }

    /// Advance and return the next value, wrapping to `min` after `max`.
    pub fn next(&mut self) -> u32 {
        if self.last >= self.max {
            self.last = self.min;
        } else {
            self.last += 1;
        }
        self.last
    }

    /// Return the most recently issued value without advancing.
    #[must_use]
    pub const fn peek(&self) -> u32 { self.last }

    /// Rewind so that the following [`next`](Self::next) yields `min`.
    pub fn reset(&mut self) { self.last = self.max; }

    /// Lower bound of the range.
    #[must_use]
    pub const fn min(&self) -> u32 { self.min }

    /// Upper bound of the range.
    #[must_use]
    pub const fn max(&self) -> u32 { self.max }
}

impl Default for SequenceCounter {
    fn default() -> Self { Self::new(1, u32::MAX) }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::SequenceCounter;

    #[test]
    fn first_value_is_min() {
        let mut counter = SequenceCounter::default();
        assert_eq!(counter.next(), 1);
        assert_eq!(counter.next(), 2);
    }

    #[test]
    fn peek_does_not_advance() {
        let mut counter = SequenceCounter::new(10, 20);
        counter.next();
        counter.next();
        assert_eq!(counter.peek(), 11);
        assert_eq!(counter.peek(), 11);
        assert_eq!(counter.next(), 12);
    }

    #[test]
    fn reset_restarts_at_min() {
        let mut counter = SequenceCounter::new(5, 100);
        for _ in 0..7 {
            counter.next();
        }
        counter.reset();
        assert_eq!(counter.next(), 5);
    }

    #[rstest]
    #[case(7, 3)]
    #[case(9, 9)]
    fn inverted_range_collapses_to_min(#[case] min: u32, #[case] max: u32) {
        let mut counter = SequenceCounter::new(min, max);
        assert_eq!(counter.max(), min);
        assert_eq!(counter.next(), min);
        assert_eq!(counter.next(), min);
    }

    #[test]
    fn wraps_at_u32_max_without_overflow() {
        let mut counter = SequenceCounter::new(u32::MAX - 1, u32::MAX);
        assert_eq!(counter.next(), u32::MAX - 1);
        assert_eq!(counter.next(), u32::MAX);
        assert_eq!(counter.next(), u32::MAX - 1);
    }

    proptest! {
        #[test]
        fn nth_value_follows_modular_sequence(max in 1u32..64, draws in 1usize..300) {
            let mut counter = SequenceCounter::new(1, max);
            for n in 1..=draws {
                let value = counter.next();
                let expected = 1 + u32::try_from((n - 1) % max as usize).expect("fits in u32");
                prop_assert_eq!(value, expected);
                prop_assert!(value <= max);
            }
        }
    }
}
