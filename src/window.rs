//! Fixed-capacity sliding window with an incrementally maintained sum.

use core::ops::{Add, Sub};

/// Circular buffer of the last `N` readings.
///
/// Slots start zeroed (`T::default()`), so the sum covers exactly the last `N`
/// inserts once `N` values have been pushed and the inserts so far before that.
/// Each insert subtracts the overwritten slot and adds the new value. A window
/// holding only zeros always sums to exactly zero.
pub struct SlidingWindow<T, const N: usize> {
    slots: [T; N],
    next: usize,
    sum: T,
    filled: usize,
    nonzero: usize,
}

impl<T, const N: usize> SlidingWindow<T, N>
where
    T: Copy + Default + PartialEq + Add<Output = T> + Sub<Output = T>,
{
    pub fn new() -> Self {
        Self {
            slots: [T::default(); N],
            next: 0,
            sum: T::default(),
            filled: 0,
            nonzero: 0,
        }
    }

    /// Insert a reading, overwriting the oldest.
    pub fn push(&mut self, value: T) {
        let zero = T::default();
        let old = self.slots[self.next];
        self.slots[self.next] = value;
        self.sum = self.sum - old + value;
        self.next = (self.next + 1) % N;
        if self.filled < N {
            self.filled += 1;
        }
        if old != zero {
            self.nonzero -= 1;
        }
        if value != zero {
            self.nonzero += 1;
        }

        // Float sums drift under repeated add/subtract; resync once per lap.
        if self.nonzero == 0 {
            self.sum = zero;
        } else if self.next == 0 {
            self.sum = self.slots.iter().fold(zero, |acc, &v| acc + v);
        }
    }

    pub fn sum(&self) -> T {
        self.sum
    }

    /// Number of inserts seen, saturating at `N`.
    pub fn len(&self) -> usize {
        self.filled
    }

    pub fn is_empty(&self) -> bool {
        self.filled == 0
    }

    /// Readings from oldest to newest (zero slots included before the first lap).
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..N).map(move |i| self.slots[(self.next + i) % N])
    }
}

impl<T, const N: usize> Default for SlidingWindow<T, N>
where
    T: Copy + Default + PartialEq + Add<Output = T> + Sub<Output = T>,
{
    fn default() -> Self {
        Self::new()
    }
}
