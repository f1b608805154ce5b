//! # Custody Tracker
//!
//! One in-flight custody operation on a foreign chain. A tracker is only moved
//! by the transition handlers of its chain's engine; the fields here are the
//! bookkeeping those handlers read and write.

use super::errors::CustodyError;
use super::multisig::BtcMultiSig;
use super::value_objects::{Address, ForeignChain, Hash, PublicKeyBytes, TrackerState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Chain-specific tracker fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "chain", rename_all = "snake_case")]
pub enum ChainDetails {
    /// Bitcoin custody: joint lock script plus the release authorization.
    Bitcoin {
        /// Co-signers of the custody address.
        #[serde(with = "hex_list")]
        signers: Vec<PublicKeyBytes>,
        /// Address of the lock script (script stored separately).
        #[serde(with = "hex::serde")]
        lock_script_address: Vec<u8>,
        /// Unsigned release transaction, opaque to the core.
        #[serde(default, with = "hex::serde")]
        process_tx: Vec<u8>,
        /// Signatures collected for the pending release.
        multisig: Option<BtcMultiSig>,
    },
    /// Ethereum custody: locking contract and the watched transaction.
    Ethereum {
        /// Bridge contract address.
        #[serde(with = "hex::serde")]
        contract_address: Vec<u8>,
        /// Raw signed transaction to broadcast, opaque to the core.
        #[serde(default, with = "hex::serde")]
        raw_tx: Vec<u8>,
        /// Hash of the foreign transaction being watched.
        tx_hash: Option<Hash>,
    },
}

impl ChainDetails {
    /// Chain these details belong to.
    pub fn chain(&self) -> ForeignChain {
        match self {
            ChainDetails::Bitcoin { .. } => ForeignChain::Bitcoin,
            ChainDetails::Ethereum { .. } => ForeignChain::Ethereum,
        }
    }
}

/// Persisted custody tracker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracker {
    /// Unique name, also the store key.
    pub name: String,
    /// Current lifecycle state.
    pub state: TrackerState,
    /// Amount in custody.
    pub current_balance: u64,
    /// Validators that confirmed foreign finality.
    pub finality_votes: BTreeSet<Address>,
    /// Votes needed for the finality predicate.
    pub required_votes: usize,
    /// Set once the minting / release task completed.
    pub task_completed: bool,
    /// Chain-specific data.
    pub details: ChainDetails,
}

impl Tracker {
    /// Fresh tracker in `New`.
    pub fn new(name: impl Into<String>, required_votes: usize, details: ChainDetails) -> Self {
        Self {
            name: name.into(),
            state: TrackerState::New,
            current_balance: 0,
            finality_votes: BTreeSet::new(),
            required_votes,
            task_completed: false,
            details,
        }
    }

    /// Foreign chain of this tracker.
    pub fn chain(&self) -> ForeignChain {
        self.details.chain()
    }

    /// Whether `validator` already voted for finality.
    pub fn check_if_voted(&self, validator: &Address) -> bool {
        self.finality_votes.contains(validator)
    }

    /// Number of finality votes.
    pub fn votes(&self) -> usize {
        self.finality_votes.len()
    }

    /// Record a finality vote. Returns false for a repeat vote.
    pub fn add_vote(&mut self, validator: Address) -> bool {
        self.finality_votes.insert(validator)
    }

    /// Balance in custody.
    pub fn balance(&self) -> u64 {
        self.current_balance
    }

    /// Add a locked amount.
    pub fn credit(&mut self, amount: u64) -> Result<(), CustodyError> {
        self.current_balance = self
            .current_balance
            .checked_add(amount)
            .ok_or_else(|| CustodyError::BalanceOverflow(self.name.clone()))?;
        Ok(())
    }

    /// Idle and able to take a new lock.
    ///
    /// A Bitcoin tracker collecting release signatures is not available even
    /// while it is still in `New`.
    pub fn is_available(&self) -> bool {
        if self.state != TrackerState::New {
            return false;
        }
        match &self.details {
            ChainDetails::Bitcoin { multisig, .. } => multisig.is_none(),
            ChainDetails::Ethereum { .. } => true,
        }
    }

    /// Chain-specific finality predicate.
    pub fn finalized(&self) -> bool {
        let quorum = self.votes() >= self.required_votes;
        match &self.details {
            ChainDetails::Bitcoin { multisig, .. } => {
                quorum && multisig.as_ref().is_some_and(BtcMultiSig::is_valid)
            }
            ChainDetails::Ethereum { .. } => quorum,
        }
    }

    /// Release multisig, for Bitcoin trackers.
    pub fn multisig(&self) -> Option<&BtcMultiSig> {
        match &self.details {
            ChainDetails::Bitcoin { multisig, .. } => multisig.as_ref(),
            ChainDetails::Ethereum { .. } => None,
        }
    }

    /// Mutable release multisig, for Bitcoin trackers.
    pub fn multisig_mut(&mut self) -> Option<&mut BtcMultiSig> {
        match &mut self.details {
            ChainDetails::Bitcoin { multisig, .. } => multisig.as_mut(),
            ChainDetails::Ethereum { .. } => None,
        }
    }
}

mod hex_list {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(items: &[Vec<u8>], s: S) -> Result<S::Ok, S::Error> {
        items
            .iter()
            .map(hex::encode)
            .collect::<Vec<_>>()
            .serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<u8>>, D::Error> {
        Vec::<String>::deserialize(d)?
            .into_iter()
            .map(|h| hex::decode(h).map_err(serde::de::Error::custom))
            .collect()
    }
}
