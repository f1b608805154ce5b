//! # Custody Service
//!
//! Composition root for the custody bridge. Owns one engine per foreign chain,
//! the per-chain tracker stores over the replicated chain state, and this
//! validator's local job store.
//!
//! ## Write discipline
//!
//! Every operation loads the tracker, mutates an owned copy and writes it back
//! only once everything else succeeded. A failed write (gas exhausted, backend
//! error) therefore leaves the stored tracker as it was.

use crate::adapters::{GasMeteredState, JobStore, TrackerStore};
use crate::algorithms::{build_bitcoin_engine, build_ethereum_engine, TrackerContext, TrackerEngine};
use crate::config::CustodyConfig;
use crate::domain::{
    Address, BtcMultiSig, BtcSignature, ChainDetails, CustodyError, ForeignChain, Job, JobId,
    PublicKeyBytes, Tracker, TrackerState, JOB_KEY_SEPARATOR,
};
use crate::ports::{ChainState, CustodyBridgeApi};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Custody bridge service.
///
/// Thread-safe; share via `Arc`. Calls are expected in consensus order.
pub struct CustodyService {
    config: CustodyConfig,
    bitcoin_engine: TrackerEngine,
    ethereum_engine: TrackerEngine,
    bitcoin_trackers: Arc<TrackerStore>,
    ethereum_trackers: Arc<TrackerStore>,
    jobs: Arc<JobStore>,
    validator: Address,
    signer_key: Option<PublicKeyBytes>,
}

impl CustodyService {
    /// Wire the service.
    ///
    /// `chain_state` is the replicated (gas-metered) state holding trackers;
    /// `local_state` is this validator's private store holding jobs.
    pub fn new(
        config: CustodyConfig,
        chain_state: Arc<dyn ChainState>,
        local_state: Arc<dyn ChainState>,
        validator: Address,
    ) -> Result<Self, CustodyError> {
        config.validate()?;

        let service = Self {
            bitcoin_engine: build_bitcoin_engine()?,
            ethereum_engine: build_ethereum_engine()?,
            bitcoin_trackers: Arc::new(TrackerStore::new(
                chain_state.clone(),
                config.bitcoin.tracker_prefix.as_bytes(),
            )),
            ethereum_trackers: Arc::new(TrackerStore::new(
                chain_state,
                config.ethereum.tracker_prefix.as_bytes(),
            )),
            jobs: Arc::new(JobStore::new(local_state, config.max_job_retries)),
            validator,
            signer_key: None,
            config,
        };

        info!(
            validator = %hex::encode(validator),
            max_job_retries = service.config.max_job_retries,
            "[qc-15] Custody service initialized"
        );
        Ok(service)
    }

    /// Wrap the replicated state in a gas meter sized by `block_gas_limit`.
    ///
    /// The host calls `reset` on the returned state at the start of each block.
    pub fn metered_chain_state<S: ChainState>(
        config: &CustodyConfig,
        state: S,
    ) -> Arc<GasMeteredState<S>> {
        Arc::new(GasMeteredState::new(state, config.block_gas_limit))
    }

    /// Set this validator's Bitcoin co-signer key.
    pub fn with_signer_key(mut self, key: PublicKeyBytes) -> Self {
        self.signer_key = Some(key);
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// This validator's address.
    pub fn validator(&self) -> Address {
        self.validator
    }

    /// Engine of `chain`.
    pub fn engine(&self, chain: ForeignChain) -> &TrackerEngine {
        match chain {
            ForeignChain::Bitcoin => &self.bitcoin_engine,
            ForeignChain::Ethereum => &self.ethereum_engine,
        }
    }

    /// Tracker store of `chain`.
    pub fn trackers(&self, chain: ForeignChain) -> &Arc<TrackerStore> {
        match chain {
            ForeignChain::Bitcoin => &self.bitcoin_trackers,
            ForeignChain::Ethereum => &self.ethereum_trackers,
        }
    }

    /// Local job store.
    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    fn check_name(name: &str) -> Result<(), CustodyError> {
        let reason = if name.is_empty() {
            "name is empty"
        } else if name.contains(JOB_KEY_SEPARATOR) {
            "name contains '#'"
        } else {
            return Ok(());
        };
        Err(CustodyError::InvalidTrackerName {
            name: name.to_string(),
            reason,
        })
    }

    fn update(
        &self,
        chain: ForeignChain,
        name: &str,
        mutate: impl FnOnce(&mut Tracker) -> Result<(), CustodyError>,
    ) -> Result<Tracker, CustodyError> {
        let store = self.trackers(chain);
        let mut tracker = store.get(name)?;
        mutate(&mut tracker)?;
        store.set_tracker(name, &tracker)?;
        Ok(tracker)
    }
}

impl CustodyBridgeApi for CustodyService {
    fn open_tracker(&self, name: &str, details: ChainDetails) -> Result<Tracker, CustodyError> {
        Self::check_name(name)?;
        let chain = details.chain();
        let store = self.trackers(chain);
        if store.exists(name)? {
            return Err(CustodyError::TrackerExists(name.to_string()));
        }

        let tracker = Tracker::new(name, self.config.chain(chain).required_votes, details);
        store.set_tracker(name, &tracker)?;
        info!(tracker = %name, chain = %chain, "[qc-15] Tracker opened");
        Ok(tracker)
    }

    fn credit_lock(&self, chain: ForeignChain, amount: u64) -> Result<Tracker, CustodyError> {
        let store = self.trackers(chain);
        let mut tracker = store.get_tracker_for_lock()?;
        tracker.credit(amount)?;
        let name = tracker.name.clone();
        store.set_tracker(&name, &tracker)?;
        info!(
            tracker = %name,
            amount,
            balance = tracker.balance(),
            "[qc-15] Lock credited"
        );
        Ok(tracker)
    }

    fn begin_release(&self, name: &str, msg: Vec<u8>, m: usize) -> Result<Tracker, CustodyError> {
        self.update(ForeignChain::Bitcoin, name, |tracker| {
            if !tracker.is_available() {
                return Err(CustodyError::ReleaseUnavailable {
                    name: tracker.name.clone(),
                    state: tracker.state,
                });
            }
            match &mut tracker.details {
                ChainDetails::Bitcoin {
                    signers, multisig, ..
                } => {
                    let release = BtcMultiSig::new(msg, m, signers.clone())?;
                    let address = release.address()?;
                    debug!(
                        tracker = %name,
                        address = %hex::encode(address),
                        "[qc-15] Release multisig attached"
                    );
                    *multisig = Some(release);
                    Ok(())
                }
                ChainDetails::Ethereum { .. } => Err(CustodyError::ContextMismatch {
                    handler: "BEGIN_RELEASE",
                    expected: ForeignChain::Bitcoin,
                    actual: ForeignChain::Ethereum,
                }),
            }
        })
    }

    fn add_signature(&self, name: &str, sig: BtcSignature) -> Result<Tracker, CustodyError> {
        self.update(ForeignChain::Bitcoin, name, |tracker| {
            let index = sig.index;
            let multisig = tracker
                .multisig_mut()
                .ok_or_else(|| CustodyError::NoReleaseInProgress(name.to_string()))?;
            multisig.add_signature(sig)?;
            debug!(
                tracker = %name,
                index,
                signed = multisig.signed_count(),
                threshold = multisig.threshold(),
                "[qc-15] Release signature added"
            );
            Ok(())
        })
    }

    fn record_vote(
        &self,
        chain: ForeignChain,
        name: &str,
        validator: Address,
    ) -> Result<Tracker, CustodyError> {
        self.update(chain, name, |tracker| {
            if !tracker.add_vote(validator) {
                debug!(tracker = %name, "[qc-15] Repeat finality vote ignored");
            }
            Ok(())
        })
    }

    fn mark_task_completed(
        &self,
        chain: ForeignChain,
        name: &str,
    ) -> Result<Tracker, CustodyError> {
        self.update(chain, name, |tracker| {
            if tracker.state != TrackerState::Finalized {
                return Err(CustodyError::InvalidState {
                    transition: "TASK_COMPLETED",
                    expected: TrackerState::Finalized,
                    actual: tracker.state,
                });
            }
            tracker.task_completed = true;
            Ok(())
        })
    }

    fn apply_transition(
        &self,
        chain: ForeignChain,
        name: &str,
        transition: &str,
    ) -> Result<Option<Tracker>, CustodyError> {
        let engine = self.engine(chain);
        let store = self.trackers(chain);
        let tracker = store.get(name)?;
        let before = tracker.clone();

        let mut ctx = TrackerContext::new(tracker, self.jobs.clone(), store.clone(), self.validator)
            .with_signer_key(self.signer_key.clone());

        if let Err(e) = engine.apply(transition, &mut ctx) {
            warn!(
                tracker = %name,
                transition,
                error = %e,
                "[qc-15] Transition failed"
            );
            return Err(e);
        }

        if engine
            .transition(transition)
            .is_some_and(|t| t.to.is_deleted())
        {
            return Ok(None);
        }

        if ctx.tracker != before {
            store.set_tracker(name, &ctx.tracker)?;
        }
        if ctx.tracker.state != before.state {
            info!(
                tracker = %name,
                from = %before.state,
                to = %ctx.tracker.state,
                "[qc-15] Tracker advanced"
            );
        }
        Ok(Some(ctx.tracker))
    }

    fn register_lock_script(
        &self,
        lock_address: &[u8],
        script: Vec<u8>,
    ) -> Result<(), CustodyError> {
        let store = &self.bitcoin_trackers;
        let owner = store.trackers()?.into_iter().find(|t| {
            matches!(
                &t.details,
                ChainDetails::Bitcoin { lock_script_address, .. }
                    if lock_script_address.as_slice() == lock_address
            )
        });
        let Some(owner) = owner else {
            return Err(CustodyError::TrackerNotFound(format!(
                "lock address {}",
                hex::encode(lock_address)
            )));
        };

        store.set_lock_script(lock_address, script)?;
        debug!(
            tracker = %owner.name,
            lock_address = %hex::encode(lock_address),
            "[qc-15] Lock script registered"
        );
        Ok(())
    }

    fn lock_script(&self, lock_address: &[u8]) -> Result<Option<Vec<u8>>, CustodyError> {
        self.bitcoin_trackers.get_lock_script(lock_address)
    }

    fn get_tracker(&self, chain: ForeignChain, name: &str) -> Result<Tracker, CustodyError> {
        self.trackers(chain).get(name)
    }

    fn get_job(&self, id: &JobId) -> Result<Job, CustodyError> {
        self.jobs.get_job(id)
    }
}
