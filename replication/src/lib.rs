//! Tick-based replication of schema values.
//!
//! A [`Publisher`] owns the authoritative value and a history of published
//! ticks. Each publish diffs against the most recent tick every observer has
//! acknowledged, so one packet is valid for all of them. A [`Receiver`]
//! mirrors the value on the other side and reports what it holds through
//! acknowledgements and forget notices.
//!
//! ```
//! use bytestream::{BufferPool, ByteWriter};
//! use codec::{CodecLimits, Tick};
//! use replication::{ParseOutcome, Publisher, Receiver, ReplicationConfig};
//! use schema::{SchemaType, StructType, Value};
//!
//! let ty = SchemaType::structure(StructType::new().field("x", SchemaType::int32())).unwrap();
//! let pool = BufferPool::new();
//!
//! let mut publisher = Publisher::new(&ty, ReplicationConfig::default());
//! publisher.add_observer("peer").unwrap();
//! let mut receiver = Receiver::new(&ty, ReplicationConfig::default(), CodecLimits::default());
//!
//! let mut out = ByteWriter::new(&pool);
//! publisher.publish(&ty, &Value::Struct(vec![Value::Int(5)]), false, &mut out).unwrap();
//! // The first byte is the frame kind.
//! let outcome = receiver.parse(&ty, &out.as_slice()[1..]).unwrap();
//! let ParseOutcome::Applied { ack, .. } = outcome else { unreachable!() };
//! publisher.acknowledge(&"peer", ack).unwrap();
//!
//! assert_eq!(receiver.current_value(), &Value::Struct(vec![Value::Int(5)]));
//! assert_eq!(publisher.common_tick(), Tick::new(1));
//! ```

mod config;
mod error;
mod observation;
mod publisher;
mod receiver;

pub use config::ReplicationConfig;
pub use error::{ReplicationError, ReplicationResult};
pub use observation::{most_recent_common_tick, ObservationSet, ObserverTable};
pub use publisher::{PublishedState, Publisher};
pub use receiver::{DropReason, ParseOutcome, Receiver};
