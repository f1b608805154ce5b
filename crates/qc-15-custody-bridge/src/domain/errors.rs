//! # Domain Errors
//!
//! Error types for the custody bridge. Each concern has its own enum; they are
//! folded into [`CustodyError`], which is what transactions surface.

use super::multisig::MultiSigError;
use super::transition::TransitionError;
use super::value_objects::{ForeignChain, TrackerState};
use thiserror::Error;

/// Chain-state / local-store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Per-block gas budget exhausted.
    #[error("Gas limit exceeded: consumed {consumed} of {limit}")]
    GasLimitExceeded {
        /// Gas consumed so far
        consumed: u64,
        /// Block limit
        limit: u64,
    },

    /// Backend failure.
    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Record encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Serialization failed.
    #[error("Serialize {tag} failed: {reason}")]
    Serialize {
        /// Type tag
        tag: &'static str,
        /// Underlying reason
        reason: String,
    },

    /// Deserialization failed.
    #[error("Deserialize {tag} failed: {reason}")]
    Deserialize {
        /// Type tag
        tag: &'static str,
        /// Underlying reason
        reason: String,
    },

    /// Record carries another type's tag.
    #[error("Type tag mismatch: expected {expected}, found {found}")]
    TagMismatch {
        /// Expected tag
        expected: &'static str,
        /// Tag found in the record
        found: String,
    },
}

/// Custody bridge error.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Engine wiring error.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Tracker is not in the transition's source state.
    #[error("Cannot apply {transition} from state {actual} (requires {expected})")]
    InvalidState {
        /// Transition name
        transition: &'static str,
        /// Required source state
        expected: TrackerState,
        /// Actual tracker state
        actual: TrackerState,
    },

    /// Status is not a tracker state.
    #[error("Status {0} is not a tracker state")]
    UnknownStatus(u8),

    /// Handler given a tracker of another chain.
    #[error("Context mismatch: {handler} expects {expected} tracker, got {actual}")]
    ContextMismatch {
        /// Handler chain
        handler: &'static str,
        /// Expected chain
        expected: ForeignChain,
        /// Tracker chain
        actual: ForeignChain,
    },

    /// Tracker absent.
    #[error("Tracker not found: {0}")]
    TrackerNotFound(String),

    /// No tracker qualifies for a new lock.
    #[error("No tracker found")]
    NoTrackerFound,

    /// Tracker name rejected.
    #[error("Invalid tracker name {name:?}: {reason}")]
    InvalidTrackerName {
        /// Offending name
        name: String,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Tracker name already in use.
    #[error("Tracker already exists: {0}")]
    TrackerExists(String),

    /// Job absent.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Job hit the retry bound.
    #[error("Job {job_id} exhausted after {retries} retries")]
    JobExhausted {
        /// Job key
        job_id: String,
        /// Retries performed
        retries: u32,
    },

    /// Release signatures missing on a Bitcoin tracker.
    #[error("No release in progress on tracker {0}")]
    NoReleaseInProgress(String),

    /// Tracker is busy and cannot start a release.
    #[error("Tracker {name} cannot start a release in state {state}")]
    ReleaseUnavailable {
        /// Tracker name
        name: String,
        /// Current state
        state: TrackerState,
    },

    /// Balance would overflow.
    #[error("Balance overflow on tracker {0}")]
    BalanceOverflow(String),

    /// Multisig error.
    #[error(transparent)]
    MultiSig(#[from] MultiSigError),

    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Codec error.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration rejected.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Another error with a description of what was being done.
    #[error("{context}: {source}")]
    Context {
        /// What failed
        context: String,
        /// Cause
        #[source]
        source: Box<CustodyError>,
    },
}

impl CustodyError {
    /// Wrap with a description of the failing operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        CustodyError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, with all context stripped.
    pub fn root(&self) -> &CustodyError {
        match self {
            CustodyError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Transient failures worth resubmitting in a later block.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            CustodyError::Store(StoreError::GasLimitExceeded { .. })
                | CustodyError::Store(StoreError::Backend(_))
        )
    }
}

/// Attach context to a failing result.
pub trait ResultExt<T> {
    /// Wrap the error with `context`.
    fn context(self, context: &str) -> Result<T, CustodyError>;
}

impl<T, E: Into<CustodyError>> ResultExt<T> for Result<T, E> {
    fn context(self, context: &str) -> Result<T, CustodyError> {
        self.map_err(|e| {
            let err: CustodyError = e.into();
            err.context(context)
        })
    }
}
