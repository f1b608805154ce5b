//! # Domain Value Objects
//!
//! Immutable value types shared by trackers, jobs and handlers.

use super::transition::Status;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validator address (20-byte).
pub type Address = [u8; 20];

/// Hash type (32-byte SHA-256).
pub type Hash = [u8; 32];

/// Compressed secp256k1 public key bytes identifying a Bitcoin co-signer.
pub type PublicKeyBytes = Vec<u8>;

/// Foreign chains with custody support.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ForeignChain {
    /// Bitcoin mainnet / testnet.
    Bitcoin,
    /// Ethereum mainnet / testnet.
    Ethereum,
}

impl ForeignChain {
    /// Short tag used in local keys.
    pub fn tag(&self) -> &'static str {
        match self {
            ForeignChain::Bitcoin => "btc",
            ForeignChain::Ethereum => "eth",
        }
    }
}

impl fmt::Display for ForeignChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForeignChain::Bitcoin => write!(f, "bitcoin"),
            ForeignChain::Ethereum => write!(f, "ethereum"),
        }
    }
}

/// Tracker lifecycle.
///
/// ```text
/// New ──BROADCASTING──→ BusyBroadcasting ──FINALIZING──→ BusyFinalizing
///                                                             │
///                                                         FINALIZE
///                                                             ↓
///      (deleted) ←──CLEANUP── Minted ←──MINTING────────── Finalized
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TrackerState {
    /// Holding custody, no operation in flight.
    #[default]
    New = 1,
    /// Foreign transaction being broadcast.
    BusyBroadcasting = 2,
    /// Waiting for foreign-chain finality votes.
    BusyFinalizing = 3,
    /// Quorum confirmed finality.
    Finalized = 4,
    /// Representation minted / funds released.
    Minted = 5,
}

impl TrackerState {
    /// Every state, in lifecycle order.
    pub const ALL: [TrackerState; 5] = [
        TrackerState::New,
        TrackerState::BusyBroadcasting,
        TrackerState::BusyFinalizing,
        TrackerState::Finalized,
        TrackerState::Minted,
    ];

    /// Engine status for this state.
    pub fn status(self) -> Status {
        Status(self as u8)
    }
}

impl From<TrackerState> for Status {
    fn from(state: TrackerState) -> Self {
        state.status()
    }
}

impl TryFrom<Status> for TrackerState {
    type Error = Status;

    fn try_from(status: Status) -> Result<Self, Self::Error> {
        TrackerState::ALL
            .into_iter()
            .find(|s| s.status() == status)
            .ok_or(status)
    }
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Transition names shared by both chain engines.
pub mod transitions {
    /// `New → BusyBroadcasting`
    pub const BROADCASTING: &str = "BROADCASTING";
    /// `BusyBroadcasting → BusyFinalizing`
    pub const FINALIZING: &str = "FINALIZING";
    /// `BusyFinalizing → Finalized`
    pub const FINALIZE: &str = "FINALIZE";
    /// `Finalized → Minted`
    pub const MINTING: &str = "MINTING";
    /// `Minted → (deleted)`
    pub const CLEANUP: &str = "CLEANUP";
}
