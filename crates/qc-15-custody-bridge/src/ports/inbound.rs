//! # Inbound Ports
//!
//! Deterministic operations the surrounding transaction pipeline invokes. Every
//! call runs inside block processing in consensus order.

use crate::domain::{
    Address, BtcSignature, ChainDetails, CustodyError, ForeignChain, Job, JobId, Tracker,
};

/// Custody bridge API - inbound port.
pub trait CustodyBridgeApi {
    /// Open a tracker in `New`.
    fn open_tracker(&self, name: &str, details: ChainDetails) -> Result<Tracker, CustodyError>;

    /// Credit a new lock to the least loaded available tracker of `chain`.
    fn credit_lock(&self, chain: ForeignChain, amount: u64) -> Result<Tracker, CustodyError>;

    /// Start a Bitcoin release: attach an `m`-of-`n` multisig over `msg`.
    fn begin_release(&self, name: &str, msg: Vec<u8>, m: usize) -> Result<Tracker, CustodyError>;

    /// Attach a validator's partial signature to a pending release.
    fn add_signature(&self, name: &str, sig: BtcSignature) -> Result<Tracker, CustodyError>;

    /// Record `validator`'s finality vote.
    fn record_vote(
        &self,
        chain: ForeignChain,
        name: &str,
        validator: Address,
    ) -> Result<Tracker, CustodyError>;

    /// Flag the minting / release task as completed.
    fn mark_task_completed(&self, chain: ForeignChain, name: &str)
        -> Result<Tracker, CustodyError>;

    /// Apply a named transition. Returns the stored tracker, or `None` once deleted.
    fn apply_transition(
        &self,
        chain: ForeignChain,
        name: &str,
        transition: &str,
    ) -> Result<Option<Tracker>, CustodyError>;

    /// Store the lock script behind a Bitcoin tracker's lock address.
    fn register_lock_script(
        &self,
        lock_address: &[u8],
        script: Vec<u8>,
    ) -> Result<(), CustodyError>;

    /// Lock script behind `lock_address`, if registered.
    fn lock_script(&self, lock_address: &[u8]) -> Result<Option<Vec<u8>>, CustodyError>;

    /// Tracker by name.
    fn get_tracker(&self, chain: ForeignChain, name: &str) -> Result<Tracker, CustodyError>;

    /// Local job by key.
    fn get_job(&self, id: &JobId) -> Result<Job, CustodyError>;
}
