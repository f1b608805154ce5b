//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound port traits: ordered in-memory state, gas metering,
//! the tagged JSON codec and the tracker / job stores built on top of them.

mod codec;
mod gas_state;
mod job_store;
mod memory_state;
mod tracker_store;

pub use codec::JsonCodec;
pub use gas_state::{costs, Gas, GasCalculator, GasMeteredState};
pub use job_store::JobStore;
pub use memory_state::InMemoryChainState;
pub use tracker_store::TrackerStore;
