//! Tracker Store Adapter
//!
//! Trackers live in the replicated chain state under `<prefix><lowercase name>`.
//! Each foreign chain gets its own prefix so lock selection only ever scans
//! trackers of one chain.

use crate::adapters::job_store::prefix_end;
use crate::adapters::JsonCodec;
use crate::domain::{CustodyError, ResultExt, Tracker};
use crate::ports::{ChainState, Serializer};
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::debug;

const LOCK_SCRIPT_PREFIX: &[u8] = b"lockscript:";

/// Persistence for one chain's trackers.
pub struct TrackerStore {
    state: Arc<dyn ChainState>,
    codec: JsonCodec,
    prefix: Vec<u8>,
}

impl TrackerStore {
    /// Store over `state`, keying trackers under `prefix`.
    pub fn new(state: Arc<dyn ChainState>, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            state,
            codec: JsonCodec,
            prefix: prefix.into(),
        }
    }

    /// Key prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    fn key(&self, name: &str) -> Vec<u8> {
        let mut key = self.prefix.clone();
        key.extend_from_slice(name.to_lowercase().as_bytes());
        key
    }

    /// Load a tracker.
    pub fn get(&self, name: &str) -> Result<Tracker, CustodyError> {
        let bytes = self
            .state
            .get(&self.key(name))
            .context("tracker read failed")?
            .ok_or_else(|| CustodyError::TrackerNotFound(name.to_string()))?;
        self.codec
            .deserialize(&bytes)
            .context("tracker deserialization failed")
    }

    /// Write `tracker` under `name`. The stored record's name is set to `name`.
    pub fn set_tracker(&self, name: &str, tracker: &Tracker) -> Result<(), CustodyError> {
        let encoded = if tracker.name == name {
            self.codec.serialize(tracker)
        } else {
            let mut renamed = tracker.clone();
            renamed.name = name.to_string();
            self.codec.serialize(&renamed)
        };
        let bytes = encoded.context("tracker serialization failed")?;

        self.state
            .set(&self.key(name), bytes)
            .context("tracker write failed")
    }

    /// Remove a tracker. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, CustodyError> {
        let removed = self
            .state
            .remove(&self.key(name))
            .context("tracker delete failed")?;
        Ok(removed.is_some())
    }

    /// Whether a tracker exists.
    pub fn exists(&self, name: &str) -> Result<bool, CustodyError> {
        self.state.exists(&self.key(name)).context("tracker lookup failed")
    }

    /// All trackers, in key order.
    pub fn trackers(&self) -> Result<Vec<Tracker>, CustodyError> {
        let mut out = Vec::new();
        self.scan(|t| {
            out.push(t);
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// The available tracker with the lowest balance.
    ///
    /// Scans the prefix range in ascending key order; on equal balances the
    /// first key wins.
    pub fn get_tracker_for_lock(&self) -> Result<Tracker, CustodyError> {
        let mut best: Option<Tracker> = None;
        self.scan(|t| {
            if t.is_available() && best.as_ref().map_or(true, |b| t.balance() < b.balance()) {
                best = Some(t);
            }
            ControlFlow::Continue(())
        })?;

        let tracker = best.ok_or(CustodyError::NoTrackerFound)?;
        debug!(
            tracker = %tracker.name,
            balance = tracker.balance(),
            "[qc-15] Selected tracker for lock"
        );
        Ok(tracker)
    }

    /// Store the lock script behind `lock_address`.
    pub fn set_lock_script(&self, lock_address: &[u8], script: Vec<u8>) -> Result<(), CustodyError> {
        self.state
            .set(&lock_script_key(lock_address), script)
            .context("lock script write failed")
    }

    /// Lock script behind `lock_address`, if stored.
    pub fn get_lock_script(&self, lock_address: &[u8]) -> Result<Option<Vec<u8>>, CustodyError> {
        self.state
            .get(&lock_script_key(lock_address))
            .context("lock script read failed")
    }

    fn scan(&self, mut f: impl FnMut(Tracker) -> ControlFlow<()>) -> Result<(), CustodyError> {
        let end = prefix_end(&self.prefix);
        let mut failure = None;

        self.state
            .iterate_range(&self.prefix, &end, true, &mut |_, v| {
                match self.codec.deserialize::<Tracker>(v) {
                    Ok(t) => f(t),
                    Err(e) => {
                        failure = Some(e);
                        ControlFlow::Break(())
                    }
                }
            })
            .context("tracker scan failed")?;

        match failure {
            Some(e) => Err(CustodyError::from(e).context("tracker scan failed")),
            None => Ok(()),
        }
    }
}

fn lock_script_key(lock_address: &[u8]) -> Vec<u8> {
    let mut key = LOCK_SCRIPT_PREFIX.to_vec();
    key.extend_from_slice(lock_address);
    key
}
