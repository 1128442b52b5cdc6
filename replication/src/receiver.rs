//! Receiver side of a replicated value.

use codec::{alloc, patch_bytes, CodecLimits, StateHistory, Tick};
use log::{debug, trace};
use schema::{SchemaType, Value};
use wire::{decode_state_packet, StatePacket};

use crate::config::ReplicationConfig;
use crate::error::ReplicationResult;

/// Why a state packet was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The packet's tick is already in history.
    DuplicateTick,
    /// The packet's base tick is not in history.
    UnknownBase,
}

/// Result of feeding one state packet to a [`Receiver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// The packet was stale or unusable and changed nothing.
    Dropped(DropReason),
    /// The packet was patched into history.
    Applied {
        /// Tick of the stored value.
        tick: Tick,
        /// Tick to acknowledge to the sender.
        ack: Tick,
        /// Horizon to report to the sender when history was trimmed.
        forget: Option<Tick>,
        /// `true` when the value became the newest known state.
        advanced: bool,
    },
}

/// Local mirror of a value published by a peer.
#[derive(Debug, Clone)]
pub struct Receiver {
    config: ReplicationConfig,
    limits: CodecLimits,
    history: StateHistory<Value>,
}

impl Receiver {
    /// Creates a receiver holding the identity of `ty` at tick 0.
    #[must_use]
    pub fn new(ty: &SchemaType, config: ReplicationConfig, limits: CodecLimits) -> Self {
        Self {
            config,
            limits,
            history: StateHistory::new(alloc(ty)),
        }
    }

    #[must_use]
    pub fn current_tick(&self) -> Tick {
        self.history.latest().0
    }

    /// Returns the newest value received.
    #[must_use]
    pub fn current_value(&self) -> &Value {
        self.history.latest().1
    }

    #[must_use]
    pub fn history(&self) -> &StateHistory<Value> {
        &self.history
    }

    /// Splits `bytes` into a state packet and applies it.
    pub fn parse(&mut self, ty: &SchemaType, bytes: &[u8]) -> ReplicationResult<ParseOutcome> {
        let packet = decode_state_packet(bytes)?;
        self.apply(ty, &packet)
    }

    /// Applies a decoded state packet.
    ///
    /// Malformed diffs are errors and leave history unchanged.
    pub fn apply(
        &mut self,
        ty: &SchemaType,
        packet: &StatePacket<'_>,
    ) -> ReplicationResult<ParseOutcome> {
        let tick = packet.header.tick;
        let base_tick = packet.header.base_tick;

        if self.history.contains(tick) {
            debug!("dropping duplicate state tick {tick}");
            return Ok(ParseOutcome::Dropped(DropReason::DuplicateTick));
        }
        let Some(base) = self.history.get(base_tick) else {
            debug!("dropping state tick {tick}: base {base_tick} not in history");
            return Ok(ParseOutcome::Dropped(DropReason::UnknownBase));
        };

        let value = patch_bytes(ty, base, packet.diff, &self.limits)?;
        let advanced = tick > self.current_tick();
        self.history.push(tick, value)?;
        trace!("applied state tick {tick} against base {base_tick}");

        let mut forget = None;
        if let Some(horizon) = self.config.horizon(base_tick) {
            let evicted = self.history.garbage_collect_with(horizon, |evicted, _| {
                debug!("receiver evicted tick {evicted} below horizon {horizon}");
            });
            if evicted {
                forget = Some(horizon);
            }
        }

        Ok(ParseOutcome::Applied {
            tick,
            ack: tick,
            forget,
            advanced,
        })
    }
}
