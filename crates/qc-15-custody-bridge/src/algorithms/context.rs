//! Per-invocation handler context.

use crate::adapters::{JobStore, TrackerStore};
use crate::domain::{Address, CustodyError, Engine, PublicKeyBytes, Tracker};
use std::sync::Arc;

/// Engine type driving custody trackers.
pub type TrackerEngine = Engine<TrackerContext, CustodyError>;

/// Everything a transition handler may touch.
///
/// The tracker is an owned copy: handlers mutate it freely and the caller
/// persists it only after the handler returns `Ok`.
pub struct TrackerContext {
    /// Working copy of the tracker.
    pub tracker: Tracker,
    /// This validator's local job store.
    pub jobs: Arc<JobStore>,
    /// Store owning the tracker's record.
    pub trackers: Arc<TrackerStore>,
    /// This validator's address, used for vote checks.
    pub validator: Address,
    /// This validator's Bitcoin co-signer key, if it holds one.
    pub signer_key: Option<PublicKeyBytes>,
}

impl TrackerContext {
    /// Context for `tracker`.
    pub fn new(
        tracker: Tracker,
        jobs: Arc<JobStore>,
        trackers: Arc<TrackerStore>,
        validator: Address,
    ) -> Self {
        Self {
            tracker,
            jobs,
            trackers,
            validator,
            signer_key: None,
        }
    }

    /// Attach the Bitcoin signer key.
    pub fn with_signer_key(mut self, key: Option<PublicKeyBytes>) -> Self {
        self.signer_key = key;
        self
    }

    /// Whether this validator already voted on the tracker.
    pub fn has_voted(&self) -> bool {
        self.tracker.check_if_voted(&self.validator)
    }
}
