//! Bidirectional relay between a Kafka broker and in-process queues
//!
//! - [`InboundRelay`]: polls the broker in batches, enqueues records
//!   locally, then commits offsets so delivery is at-least-once
//! - [`OutboundRelay`]: drains the local queue and publishes one record
//!   at a time, preserving order
//! - [`RelayEngine`]: builds the queues, spawns both relays, and hands
//!   back an [`EngineHandle`] for per-direction and composite shutdown
//! - [`ThroughputMeter`]: rate-limited throughput logging for both
//!   directions

mod engine;
mod inbound;
mod outbound;
mod speed;

pub use engine::{EngineConfig, EngineHandle, EnginePorts, RelayEngine};
pub use inbound::InboundRelay;
pub use outbound::OutboundRelay;
pub use speed::ThroughputMeter;
