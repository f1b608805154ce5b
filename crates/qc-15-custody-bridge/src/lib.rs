//! # QC-15 Custody Bridge
//!
//! Validator-side core of the cross-chain custody bridge: the network jointly
//! holds assets locked on Bitcoin or Ethereum, tracks each operation through
//! its irreversible phases and mints / releases once a quorum of validators
//! confirmed foreign finality.
//!
//! **Subsystem ID:** 15
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Lifecycle
//!
//! ```text
//! New ──BROADCASTING──→ BusyBroadcasting ──FINALIZING──→ BusyFinalizing
//!                                                             │
//!                                                         FINALIZE
//!                                                             ↓
//!      (deleted) ←──CLEANUP── Minted ←──MINTING────────── Finalized
//! ```
//!
//! ## Determinism
//!
//! | Path | Runs | Touches |
//! |------|------|---------|
//! | Transitions | In consensus order, inside block processing | Replicated chain state (gas-metered) |
//! | Jobs | Per validator, asynchronously | Local job store, foreign chains |
//!
//! Handlers never do I/O, read the clock or use randomness. Off-chain results
//! come back only as new transactions.
//!
//! ## Module Structure
//!
//! ```text
//! qc-15-custody-bridge/
//! ├── domain/          # Engine, Tracker, Job, BtcMultiSig, errors
//! ├── algorithms/      # Per-chain transition handlers
//! ├── adapters/        # In-memory state, gas metering, codec, stores
//! ├── ports/           # CustodyBridgeApi, ChainState, JobExecutor
//! ├── service/         # CustodyService, JobRunner
//! ├── config.rs        # CustodyConfig
//! └── telemetry.rs     # Log subscriber setup
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod telemetry;

// Re-exports
pub use adapters::{
    GasCalculator, GasMeteredState, InMemoryChainState, JobStore, JsonCodec, TrackerStore,
};
pub use algorithms::{
    build_bitcoin_engine, build_engine, build_ethereum_engine, TrackerContext, TrackerEngine,
};
pub use config::{ChainConfig, CustodyConfig, LoggingConfig};
pub use domain::{
    transitions, Address, BtcMultiSig, BtcSignature, ChainDetails, CodecError, CustodyError,
    Edge, Engine, ForeignChain, Job, JobId, JobKind, MultiSigError, ResultExt, RetryOutcome,
    Status, StoreError, Tracker, TrackerState, Transition, TransitionError, MAX_JOB_RETRIES,
};
pub use ports::{
    ChainState, CustodyBridgeApi, ExecutionResult, JobExecutor, MockJobExecutor, Serializer,
    Tagged,
};
pub use service::{CustodyService, JobOutcome, JobRunner, JobStatus};
pub use telemetry::init_logging;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
