//! # Algorithms Module
//!
//! Transition handlers for custody trackers, one engine per foreign chain.

pub mod bitcoin;
pub mod context;
pub mod ethereum;
mod phases;

pub use bitcoin::build_bitcoin_engine;
pub use context::{TrackerContext, TrackerEngine};
pub use ethereum::build_ethereum_engine;

use crate::domain::{ForeignChain, TransitionError};

/// Build the engine for `chain`.
pub fn build_engine(chain: ForeignChain) -> Result<TrackerEngine, TransitionError> {
    match chain {
        ForeignChain::Bitcoin => build_bitcoin_engine(),
        ForeignChain::Ethereum => build_ethereum_engine(),
    }
}
