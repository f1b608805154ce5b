//! Custody bridge configuration from environment variables.

use crate::domain::{CustodyError, ForeignChain, MAX_JOB_RETRIES};
use serde::Deserialize;
use std::env;

/// Default per-block gas budget.
pub const DEFAULT_BLOCK_GAS_LIMIT: u64 = 10_000_000;

/// Per-chain tracker settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    /// Key prefix of this chain's trackers in chain state
    pub tracker_prefix: String,

    /// Finality votes needed by new trackers
    pub required_votes: usize,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Configuration for the custody bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CustodyConfig {
    /// Failed attempts after which a job is terminal
    pub max_job_retries: u32,

    /// Gas budget per block for chain-state access
    pub block_gas_limit: u64,

    /// Bitcoin tracker settings
    pub bitcoin: ChainConfig,

    /// Ethereum tracker settings
    pub ethereum: ChainConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            max_job_retries: MAX_JOB_RETRIES,
            block_gas_limit: DEFAULT_BLOCK_GAS_LIMIT,
            bitcoin: ChainConfig {
                tracker_prefix: "btc_tracker_".to_string(),
                required_votes: 1,
            },
            ethereum: ChainConfig {
                tracker_prefix: "eth_tracker_".to_string(),
                required_votes: 1,
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl CustodyConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_CUSTODY_MAX_JOB_RETRIES`: Job retry bound (default: 10)
    /// - `QC_CUSTODY_BLOCK_GAS_LIMIT`: Gas per block (default: 10000000)
    /// - `QC_CUSTODY_BTC_REQUIRED_VOTES`: Bitcoin finality quorum (default: 1)
    /// - `QC_CUSTODY_ETH_REQUIRED_VOTES`: Ethereum finality quorum (default: 1)
    /// - `QC_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `QC_JSON_LOGS`: Enable JSON logs (default: false)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            max_job_retries: parsed("QC_CUSTODY_MAX_JOB_RETRIES")
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_job_retries),

            block_gas_limit: parsed("QC_CUSTODY_BLOCK_GAS_LIMIT")
                .unwrap_or(defaults.block_gas_limit),

            bitcoin: ChainConfig {
                required_votes: parsed("QC_CUSTODY_BTC_REQUIRED_VOTES")
                    .and_then(|v| usize::try_from(v).ok())
                    .unwrap_or(defaults.bitcoin.required_votes),
                ..defaults.bitcoin
            },

            ethereum: ChainConfig {
                required_votes: parsed("QC_CUSTODY_ETH_REQUIRED_VOTES")
                    .and_then(|v| usize::try_from(v).ok())
                    .unwrap_or(defaults.ethereum.required_votes),
                ..defaults.ethereum
            },

            logging: LoggingConfig {
                log_level: lookup("QC_LOG_LEVEL")
                    .or_else(|| lookup("RUST_LOG"))
                    .unwrap_or(defaults.logging.log_level),
                json_logs: lookup("QC_JSON_LOGS")
                    .map(|v| v.to_lowercase() == "true" || v == "1")
                    .unwrap_or(defaults.logging.json_logs),
            },
        }
    }

    /// Settings for `chain`.
    pub fn chain(&self, chain: ForeignChain) -> &ChainConfig {
        match chain {
            ForeignChain::Bitcoin => &self.bitcoin,
            ForeignChain::Ethereum => &self.ethereum,
        }
    }

    /// Reject settings the bridge cannot run with.
    pub fn validate(&self) -> Result<(), CustodyError> {
        if self.max_job_retries == 0 {
            return Err(CustodyError::Config("max_job_retries must be positive".into()));
        }
        if self.block_gas_limit == 0 {
            return Err(CustodyError::Config("block_gas_limit must be positive".into()));
        }
        for chain in [ForeignChain::Bitcoin, ForeignChain::Ethereum] {
            let cfg = self.chain(chain);
            if cfg.required_votes == 0 {
                return Err(CustodyError::Config(format!(
                    "{} required_votes must be positive",
                    chain
                )));
            }
            if cfg.tracker_prefix.is_empty() {
                return Err(CustodyError::Config(format!(
                    "{} tracker_prefix must not be empty",
                    chain
                )));
            }
        }
        if self.bitcoin.tracker_prefix.starts_with(&self.ethereum.tracker_prefix)
            || self.ethereum.tracker_prefix.starts_with(&self.bitcoin.tracker_prefix)
        {
            return Err(CustodyError::Config(
                "tracker prefixes must not overlap".into(),
            ));
        }
        Ok(())
    }
}
