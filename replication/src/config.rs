//! Replication configuration.

/// Tuning for publishers and receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReplicationConfig {
    /// Extra ticks of history kept below the current base tick.
    ///
    /// History older than `base_tick - window_size - 1` is evicted after
    /// every publish and every applied packet. Zero keeps only what the
    /// current base needs.
    pub window_size: u32,
}

impl ReplicationConfig {
    /// Creates a config with the given window size.
    #[must_use]
    pub const fn with_window(window_size: u32) -> Self {
        Self { window_size }
    }

    /// Returns the eviction horizon for a base tick, if it is above zero.
    #[must_use]
    pub fn horizon(&self, base_tick: codec::Tick) -> Option<codec::Tick> {
        let horizon = i64::from(base_tick.raw()) - i64::from(self.window_size) - 1;
        u32::try_from(horizon)
            .ok()
            .filter(|&h| h > 0)
            .map(codec::Tick::new)
    }
}
