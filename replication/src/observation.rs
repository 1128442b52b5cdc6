//! Per-observer acknowledgement tracking.

use std::collections::HashMap;
use std::hash::Hash;

use codec::Tick;

use crate::error::{ReplicationError, ReplicationResult};

/// Ticks one peer is known to hold, in ascending order.
///
/// Tick 0 is always present: every peer starts from the identity value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationSet {
    ticks: Vec<Tick>,
}

impl Default for ObservationSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservationSet {
    /// Creates a set holding only tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks: vec![Tick::ZERO],
        }
    }

    /// Records that the peer holds `tick`.
    ///
    /// Returns `false` if it was already recorded.
    pub fn acknowledge(&mut self, tick: Tick) -> bool {
        let mut idx = self.ticks.len();
        while idx > 0 && self.ticks[idx - 1] > tick {
            idx -= 1;
        }
        if idx > 0 && self.ticks[idx - 1] == tick {
            return false;
        }
        self.ticks.insert(idx, tick);
        true
    }

    /// Drops every tick below `horizon` except tick 0.
    pub fn forget(&mut self, horizon: Tick) {
        self.ticks.retain(|&t| t.is_zero() || t >= horizon);
    }

    /// Returns the recorded ticks in ascending order.
    #[must_use]
    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    #[must_use]
    pub fn contains(&self, tick: Tick) -> bool {
        self.ticks.binary_search(&tick).is_ok()
    }

    /// Returns the newest recorded tick.
    #[must_use]
    pub fn latest(&self) -> Tick {
        self.ticks.last().copied().unwrap_or(Tick::ZERO)
    }
}

/// Observation sets keyed by peer, stored densely.
///
/// Removal swaps the last entry into the freed slot, so insertion and
/// removal are O(1) and iteration touches only live entries.
#[derive(Debug, Clone)]
pub struct ObserverTable<K> {
    entries: Vec<(K, ObservationSet)>,
    index: HashMap<K, usize>,
}

impl<K> Default for ObserverTable<K> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> ObserverTable<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Registers a peer with a fresh observation set.
    pub fn insert(&mut self, key: K) -> ReplicationResult<()> {
        if self.index.contains_key(&key) {
            return Err(ReplicationError::DuplicateObserver);
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, ObservationSet::new()));
        Ok(())
    }

    /// Unregisters a peer, returning its observation set.
    pub fn remove(&mut self, key: &K) -> ReplicationResult<ObservationSet> {
        let idx = self
            .index
            .remove(key)
            .ok_or(ReplicationError::UnknownObserver)?;
        let (_, set) = self.entries.swap_remove(idx);
        if let Some((moved, _)) = self.entries.get(idx) {
            self.index.insert(moved.clone(), idx);
        }
        Ok(set)
    }

    #[must_use]
    pub fn get(&self, key: &K) -> Option<&ObservationSet> {
        self.index.get(key).map(|&idx| &self.entries[idx].1)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut ObservationSet> {
        self.index.get(key).map(|&idx| &mut self.entries[idx].1)
    }

    /// Iterates in storage order, which changes when peers are removed.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &ObservationSet)> {
        self.entries.iter().map(|(k, set)| (k, set))
    }

    pub fn sets_mut(&mut self) -> impl Iterator<Item = &mut ObservationSet> {
        self.entries.iter_mut().map(|(_, set)| set)
    }
}

/// Returns the greatest tick present in every list.
///
/// Each list must be ascending. A cursor starts at the end of every list;
/// while the cursors disagree, the one showing the largest tick steps back.
/// Lists normally all contain tick 0, which bounds the walk; an empty list,
/// or one that runs out, yields [`Tick::ZERO`].
#[must_use]
pub fn most_recent_common_tick(lists: &[&[Tick]]) -> Tick {
    if lists.is_empty() {
        return Tick::ZERO;
    }
    let mut cursors: Vec<usize> = Vec::with_capacity(lists.len());
    for list in lists {
        match list.len().checked_sub(1) {
            Some(last) => cursors.push(last),
            None => return Tick::ZERO,
        }
    }
    loop {
        let mut max_at = 0;
        let mut all_equal = true;
        let first = lists[0][cursors[0]];
        for (i, list) in lists.iter().enumerate() {
            let tick = list[cursors[i]];
            if tick != first {
                all_equal = false;
            }
            if tick > lists[max_at][cursors[max_at]] {
                max_at = i;
            }
        }
        if all_equal {
            return first;
        }
        match cursors[max_at].checked_sub(1) {
            Some(prev) => cursors[max_at] = prev,
            None => return Tick::ZERO,
        }
    }
}
