//! Tick-indexed history of published values.

use crate::error::HistoryError;
use crate::Tick;

/// An ordered history of values keyed by strictly increasing ticks.
///
/// The entry at index 0 is the identity state at [`Tick::ZERO`] and is never
/// evicted, so a peer that has acknowledged nothing can always be diffed
/// against it.
#[derive(Debug, Clone)]
pub struct StateHistory<T> {
    ticks: Vec<Tick>,
    values: Vec<T>,
}

impl<T> StateHistory<T> {
    /// Creates a history seeded with `identity` at tick 0.
    #[must_use]
    pub fn new(identity: T) -> Self {
        Self {
            ticks: vec![Tick::ZERO],
            values: vec![identity],
        }
    }

    /// Returns the number of entries stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    /// Always `false`; the identity entry is permanent.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Inserts a value at the given tick, keeping ticks ascending.
    ///
    /// Near in-order arrival is the common case, so the insertion point is
    /// found by scanning back from the tail.
    pub fn push(&mut self, tick: Tick, value: T) -> Result<(), HistoryError> {
        let mut idx = self.ticks.len();
        while idx > 0 && self.ticks[idx - 1] > tick {
            idx -= 1;
        }
        if idx > 0 && self.ticks[idx - 1] == tick {
            return Err(HistoryError::DuplicateTick { tick });
        }
        self.ticks.insert(idx, tick);
        self.values.insert(idx, value);
        Ok(())
    }

    /// Returns the index of the latest entry whose tick is `<= tick`.
    ///
    /// Returns `None` if `tick` is older than every retained entry.
    #[must_use]
    pub fn at(&self, tick: Tick) -> Option<usize> {
        let after = self.ticks.partition_point(|&t| t <= tick);
        after.checked_sub(1)
    }

    /// Returns the index of the entry stored at exactly `tick`.
    #[must_use]
    pub fn index_of(&self, tick: Tick) -> Option<usize> {
        self.ticks.binary_search(&tick).ok()
    }

    /// Returns the value stored at exactly `tick`.
    #[must_use]
    pub fn get(&self, tick: Tick) -> Option<&T> {
        self.index_of(tick).map(|idx| &self.values[idx])
    }

    /// Returns `true` if a value is stored at exactly `tick`.
    #[must_use]
    pub fn contains(&self, tick: Tick) -> bool {
        self.index_of(tick).is_some()
    }

    /// Returns the entry at `index`.
    #[must_use]
    pub fn entry(&self, index: usize) -> Option<(Tick, &T)> {
        Some((*self.ticks.get(index)?, self.values.get(index)?))
    }

    /// Returns the retained ticks in ascending order.
    #[must_use]
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Returns the newest entry.
    #[must_use]
    pub fn latest(&self) -> (Tick, &T) {
        let last = self.ticks.len() - 1;
        (self.ticks[last], &self.values[last])
    }

    /// Returns an iterator from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Tick, &T)> {
        self.ticks.iter().copied().zip(self.values.iter())
    }

    /// Removes every entry older than `horizon` except the identity entry.
    ///
    /// Returns `true` if anything was removed.
    pub fn garbage_collect(&mut self, horizon: Tick) -> bool {
        self.garbage_collect_with(horizon, |_, _| {})
    }

    /// Like [`garbage_collect`](Self::garbage_collect), handing each evicted
    /// entry to `on_evict`.
    pub fn garbage_collect_with<F>(&mut self, horizon: Tick, mut on_evict: F) -> bool
    where
        F: FnMut(Tick, T),
    {
        let end = self.ticks.partition_point(|&t| t < horizon).max(1);
        if end <= 1 {
            return false;
        }
        let evicted = self.ticks.drain(1..end).zip(self.values.drain(1..end));
        for (tick, value) in evicted {
            on_evict(tick, value);
        }
        true
    }
}
