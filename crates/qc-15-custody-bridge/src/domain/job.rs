//! # Jobs
//!
//! A job is one unit of off-chain work tied to a tracker phase. Its key is
//! derived from `(chain, tracker_name, target_state)` only, so the handler
//! that asks for a job twice gets the same record back. Tracker names are
//! unique per chain, not across chains, so the chain is part of the key.
//!
//! Retry bookkeeping:
//!
//! ```text
//! pending ──failure──→ retry_count += 1 ──(retry_count == max)──→ exhausted (terminal)
//!    │
//!    └──success──→ done
//! ```

use super::value_objects::{ForeignChain, TrackerState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default retry bound for a job.
pub const MAX_JOB_RETRIES: u32 = 10;

/// Separates the tracker name from the target state in a job key.
pub const JOB_KEY_SEPARATOR: char = '#';

/// Kind of off-chain work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Produce this validator's partial signature for a Bitcoin release.
    #[serde(rename = "btc_addsign")]
    AddSignature,
    /// Broadcast the Bitcoin release transaction.
    #[serde(rename = "btc_broadcast")]
    BtcBroadcast,
    /// Watch the Bitcoin transaction until final.
    #[serde(rename = "btc_cf")]
    BtcCheckFinality,
    /// Broadcast the Ethereum transaction.
    #[serde(rename = "eth_broadcast")]
    EthBroadcast,
    /// Watch the Ethereum transaction until final.
    #[serde(rename = "eth_cf")]
    EthCheckFinality,
}

impl JobKind {
    /// Human-readable type name.
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::AddSignature => "addSignature",
            JobKind::BtcBroadcast => "btcBroadcast",
            JobKind::BtcCheckFinality => "btcCheckFinality",
            JobKind::EthBroadcast => "ethBroadcast",
            JobKind::EthCheckFinality => "ethCheckFinality",
        }
    }

    /// Broadcast job kind for `chain`.
    pub fn broadcast(chain: ForeignChain) -> Self {
        match chain {
            ForeignChain::Bitcoin => JobKind::BtcBroadcast,
            ForeignChain::Ethereum => JobKind::EthBroadcast,
        }
    }

    /// Foreign chain the work runs against.
    pub fn chain(&self) -> ForeignChain {
        match self {
            JobKind::AddSignature | JobKind::BtcBroadcast | JobKind::BtcCheckFinality => {
                ForeignChain::Bitcoin
            }
            JobKind::EthBroadcast | JobKind::EthCheckFinality => ForeignChain::Ethereum,
        }
    }

    /// Finality-check job kind for `chain`.
    pub fn check_finality(chain: ForeignChain) -> Self {
        match chain {
            ForeignChain::Bitcoin => JobKind::BtcCheckFinality,
            ForeignChain::Ethereum => JobKind::EthCheckFinality,
        }
    }
}

/// Deterministic job key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    /// Key for the job driving `chain`'s tracker `tracker_name` towards `target`.
    pub fn new(chain: ForeignChain, tracker_name: &str, target: TrackerState) -> Self {
        JobId(format!(
            "{}{:02}",
            Self::tracker_prefix(chain, tracker_name),
            target as u8
        ))
    }

    /// Key prefix shared by every job of a tracker.
    ///
    /// Unambiguous as long as names never contain [`JOB_KEY_SEPARATOR`].
    pub fn tracker_prefix(chain: ForeignChain, tracker_name: &str) -> String {
        format!(
            "{}:{}{}",
            chain.tag(),
            tracker_name.to_lowercase(),
            JOB_KEY_SEPARATOR
        )
    }

    /// String form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of recording a failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// Attempts remain.
    Retry {
        /// Attempts left before exhaustion
        remaining: u32,
    },
    /// Bound reached; the job must not run again.
    Exhausted,
}

/// Persisted off-chain work item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Work type.
    pub kind: JobKind,
    /// Owning tracker.
    pub tracker_name: String,
    /// Tracker state this job drives towards.
    pub target_state: TrackerState,
    /// Failed attempts so far.
    pub retry_count: u32,
    /// Off-chain action completed.
    pub done: bool,
}

impl Job {
    /// New pending job.
    pub fn new(kind: JobKind, tracker_name: impl Into<String>, target_state: TrackerState) -> Self {
        Self {
            kind,
            tracker_name: tracker_name.into(),
            target_state,
            retry_count: 0,
            done: false,
        }
    }

    /// Deterministic key.
    pub fn id(&self) -> JobId {
        JobId::new(self.kind.chain(), &self.tracker_name, self.target_state)
    }

    /// Whether the off-chain action completed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Whether the retry bound was reached.
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        !self.done && self.retry_count >= max_retries
    }

    /// Eligible to be handed to an executor.
    pub fn is_pending(&self, max_retries: u32) -> bool {
        !self.done && !self.is_exhausted(max_retries)
    }

    /// Count one failed attempt. Never moves past `max_retries`.
    pub fn record_failure(&mut self, max_retries: u32) -> RetryOutcome {
        if self.retry_count < max_retries {
            self.retry_count += 1;
        }
        if self.retry_count >= max_retries {
            RetryOutcome::Exhausted
        } else {
            RetryOutcome::Retry {
                remaining: max_retries - self.retry_count,
            }
        }
    }

    /// Mark the off-chain action complete.
    pub fn mark_done(&mut self) {
        self.done = true;
    }
}
