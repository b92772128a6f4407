//! Lattica History - Bounded FIFO buffer for per-cell state history
//!
//! This crate provides the fixed-capacity rolling history every cell keeps
//! so that rules can look back a few generations and the controller can
//! rewind the lattice.
//!
//! # Features
//!
//! - **Bounded memory**: size never exceeds the configured capacity
//! - **O(1) insertion**: appending evicts at most the single oldest entry
//! - **O(1) lookup**: index from the newest end for "generation - k" reads
//! - **Newest-end removal**: rewind pops from the newest end only
//! - **Exact undo**: an evicted entry can be put back after the push that
//!   evicted it is popped
//!
//! # Example
//!
//! ```rust
//! use lattica_history::FiniteHistory;
//!
//! let mut history = FiniteHistory::new(3);
//! history.push(1);
//! history.push(2);
//! history.push(3);
//!
//! // Full: the next push evicts the oldest entry
//! assert_eq!(history.push(4), Some(1));
//! assert_eq!(history.newest(), Some(&4));
//! assert_eq!(history.back(2), Some(&2));
//!
//! // Rewind removes from the newest end
//! assert_eq!(history.pop_newest(), Some(4));
//! assert_eq!(history.len(), 2);
//! ```

use std::collections::VecDeque;

/// A ring of the most recent values, oldest first
///
/// Ordering is append-only except for [`pop_newest`](Self::pop_newest),
/// which removes from the newest end.
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteHistory<T> {
    /// Stored values (front = oldest, back = newest)
    entries: VecDeque<T>,
    /// Maximum number of values retained
    capacity: usize,
}

impl<T> FiniteHistory<T> {
    /// Create an empty history holding at most `capacity` values
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than 0");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Create a history pre-filled with `count` copies of `value`
    ///
    /// `count` is truncated to the capacity.
    pub fn filled(capacity: usize, value: T, count: usize) -> Self
    where
        T: Clone,
    {
        let mut history = Self::new(capacity);
        for _ in 0..count.min(capacity) {
            history.entries.push_back(value.clone());
        }
        history
    }

    /// Append a value as the newest entry
    ///
    /// Returns the evicted oldest value when the history was already full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(value);
        evicted
    }

    /// Remove and return the newest value
    pub fn pop_newest(&mut self) -> Option<T> {
        self.entries.pop_back()
    }

    /// Put `value` back as the oldest entry
    ///
    /// Reverses an eviction after the evicting push has been popped.
    /// Returns false, dropping `value`, if the history is full.
    pub fn restore_oldest(&mut self, value: T) -> bool {
        if self.entries.len() == self.capacity {
            return false;
        }
        self.entries.push_front(value);
        true
    }

    /// The newest value
    pub fn newest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// The value `steps` entries behind the newest (0 = newest)
    pub fn back(&self, steps: usize) -> Option<&T> {
        let idx = self.entries.len().checked_sub(steps + 1)?;
        self.entries.get(idx)
    }

    /// Mutable access to the value `steps` entries behind the newest
    pub fn back_mut(&mut self, steps: usize) -> Option<&mut T> {
        let idx = self.entries.len().checked_sub(steps + 1)?;
        self.entries.get_mut(idx)
    }

    /// Iterate from oldest to newest
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Iterate the newest `count` values, newest first
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &T> {
        self.entries.iter().rev().take(count)
    }

    /// Number of values currently stored
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if the next push will evict
    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    /// Maximum number of values retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
