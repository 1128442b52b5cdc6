//! Sender side of a replicated value.

use std::hash::Hash;

use bytestream::ByteWriter;
use codec::{alloc, check_limits, clone_value, diff, CodecLimits, StateHistory, Tick};
use log::{debug, trace};
use schema::{SchemaType, Value};
use wire::{begin_state_frame, Limits, StateHeader};

use crate::config::ReplicationConfig;
use crate::error::{ReplicationError, ReplicationResult};
use crate::observation::{most_recent_common_tick, ObservationSet, ObserverTable};

/// Summary of one [`Publisher::publish`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedState {
    /// Tick assigned to the new value.
    pub tick: Tick,
    /// Tick the diff was computed against.
    pub base_tick: Tick,
    /// `false` when the new value equals the base and the diff is empty.
    pub changed: bool,
    /// `true` if history was trimmed afterwards.
    pub evicted: bool,
}

/// Authoritative copy of a value replicated to a set of observers.
///
/// Every publish diffs against the most recent tick all observers (and this
/// publisher) still hold, so one packet serves every observer.
///
/// Values and frames are checked against the limits observers decode with,
/// so a publish either produces a frame every observer accepts or fails
/// without advancing the tick.
#[derive(Debug, Clone)]
pub struct Publisher<K> {
    config: ReplicationConfig,
    codec_limits: CodecLimits,
    wire_limits: Limits,
    history: StateHistory<Value>,
    observers: ObserverTable<K>,
}

impl<K: Eq + Hash + Clone> Publisher<K> {
    /// Creates a publisher seeded with the identity of `ty` at tick 0.
    ///
    /// Published values and frames are not size-checked.
    #[must_use]
    pub fn new(ty: &SchemaType, config: ReplicationConfig) -> Self {
        Self::with_limits(ty, config, CodecLimits::unlimited(), Limits::unlimited())
    }

    /// Creates a publisher that rejects values and frames its observers would
    /// refuse to decode under `codec_limits` and `wire_limits`.
    #[must_use]
    pub fn with_limits(
        ty: &SchemaType,
        config: ReplicationConfig,
        codec_limits: CodecLimits,
        wire_limits: Limits,
    ) -> Self {
        Self {
            config,
            codec_limits,
            wire_limits,
            history: StateHistory::new(alloc(ty)),
            observers: ObserverTable::new(),
        }
    }

    /// Returns the tick of the latest published value.
    #[must_use]
    pub fn current_tick(&self) -> Tick {
        self.history.latest().0
    }

    /// Returns the latest published value.
    #[must_use]
    pub fn current_value(&self) -> &Value {
        self.history.latest().1
    }

    #[must_use]
    pub fn history(&self) -> &StateHistory<Value> {
        &self.history
    }

    #[must_use]
    pub fn observers(&self) -> &ObserverTable<K> {
        &self.observers
    }

    #[must_use]
    pub const fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Publishes `value` as the next tick and writes its state frame to `out`.
    ///
    /// When `reliable` is set the caller guarantees delivery, so the new tick
    /// is recorded as acknowledged by every observer right away.
    ///
    /// On error nothing is written to `out` and the tick does not advance.
    pub fn publish(
        &mut self,
        ty: &SchemaType,
        value: &Value,
        reliable: bool,
        out: &mut ByteWriter,
    ) -> ReplicationResult<PublishedState> {
        let base_tick = self.common_tick();
        let base = self
            .history
            .get(base_tick)
            .ok_or(ReplicationError::BaseTickEvicted { tick: base_tick })?;

        let tick = self
            .current_tick()
            .next()
            .ok_or(ReplicationError::TickOverflow)?;
        let stored = clone_value(ty, value)?;
        check_limits(ty, &stored, &self.codec_limits)?;

        let start = out.len();
        begin_state_frame(&StateHeader::new(tick, base_tick), out);
        let changed = match diff(ty, base, &stored, out) {
            Ok(changed) => changed,
            Err(err) => {
                out.truncate(start);
                return Err(err.into());
            }
        };
        if let Err(err) = self.wire_limits.check_packet(out.len() - start) {
            debug!("refusing tick {tick}: {err}");
            out.truncate(start);
            return Err(err.into());
        }
        trace!(
            "published tick {tick} against base {base_tick}: {} bytes",
            out.len() - start
        );

        self.history.push(tick, stored)?;
        if reliable {
            for set in self.observers.sets_mut() {
                set.acknowledge(tick);
            }
        }
        let evicted = self.evict(base_tick);

        Ok(PublishedState {
            tick,
            base_tick,
            changed,
            evicted,
        })
    }

    /// Records that `observer` holds `tick`.
    pub fn acknowledge(&mut self, observer: &K, tick: Tick) -> ReplicationResult<()> {
        let set = self
            .observers
            .get_mut(observer)
            .ok_or(ReplicationError::UnknownObserver)?;
        set.acknowledge(tick);
        Ok(())
    }

    /// Records that `observer` dropped every tick below `horizon`.
    pub fn forget(&mut self, observer: &K, horizon: Tick) -> ReplicationResult<()> {
        let set = self
            .observers
            .get_mut(observer)
            .ok_or(ReplicationError::UnknownObserver)?;
        set.forget(horizon);
        Ok(())
    }

    /// Starts tracking a new observer, which holds only tick 0.
    pub fn add_observer(&mut self, observer: K) -> ReplicationResult<()> {
        self.observers.insert(observer)
    }

    /// Stops tracking an observer.
    pub fn remove_observer(&mut self, observer: &K) -> ReplicationResult<ObservationSet> {
        self.observers.remove(observer)
    }

    /// Returns the tick the next publish will diff against.
    #[must_use]
    pub fn common_tick(&self) -> Tick {
        let mut lists: Vec<&[Tick]> = Vec::with_capacity(self.observers.len() + 1);
        lists.push(self.history.ticks());
        lists.extend(self.observers.iter().map(|(_, set)| set.ticks()));
        most_recent_common_tick(&lists)
    }

    fn evict(&mut self, base_tick: Tick) -> bool {
        let Some(horizon) = self.config.horizon(base_tick) else {
            return false;
        };
        self.history.garbage_collect_with(horizon, |tick, _| {
            debug!("publisher evicted tick {tick} below horizon {horizon}");
        })
    }
}
