//! # Simulated Validator Network
//!
//! Every validator owns a replica of the chain state and a private job store.
//! Transactions are applied to every replica in the same order, the way
//! consensus would deliver them, so replicas can be compared byte for byte.

use std::ops::ControlFlow;
use std::sync::Arc;

use qc_15_custody_bridge::{
    Address, ChainState, CustodyConfig, CustodyError, CustodyService, GasMeteredState,
    InMemoryChainState, JobRunner,
};

/// One validator node.
pub struct Validator {
    /// Validator address
    pub address: Address,
    /// Bitcoin co-signer key
    pub signer_key: Vec<u8>,
    /// Replica of the chain state
    pub chain: Arc<GasMeteredState<InMemoryChainState>>,
    /// Deterministic service
    pub service: CustodyService,
    /// Local job runner
    pub runner: JobRunner,
}

/// A set of validators fed the same transactions.
pub struct Network {
    /// Validators, in index order
    pub validators: Vec<Validator>,
    gas_limit: u64,
}

impl Network {
    /// `n` validators with identical configuration.
    pub fn new(n: u8, config: CustodyConfig) -> Self {
        let gas_limit = config.block_gas_limit;
        let validators = (0..n)
            .map(|i| {
                let address = [i + 1; 20];
                let signer_key = signer_key(i);
                let chain = CustodyService::metered_chain_state(&config, InMemoryChainState::new());
                let service = CustodyService::new(
                    config.clone(),
                    chain.clone(),
                    Arc::new(InMemoryChainState::new()),
                    address,
                )
                .expect("valid config")
                .with_signer_key(signer_key.clone());
                let runner = JobRunner::new(service.jobs().clone());
                Validator {
                    address,
                    signer_key,
                    chain,
                    service,
                    runner,
                }
            })
            .collect();

        Self {
            validators,
            gas_limit,
        }
    }

    /// Validator `i`.
    pub fn validator(&self, i: usize) -> &Validator {
        &self.validators[i]
    }

    /// Start a new block on every replica.
    pub fn begin_block(&self) {
        self.begin_block_with_gas(self.gas_limit);
    }

    /// Start a new block with a custom gas budget.
    pub fn begin_block_with_gas(&self, limit: u64) {
        for v in &self.validators {
            v.chain.reset(limit);
        }
    }

    /// Apply one transaction on every replica.
    ///
    /// Panics if replicas disagree on success, which would fork the chain.
    pub fn submit<T>(
        &self,
        tx: impl Fn(&CustodyService) -> Result<T, CustodyError>,
    ) -> Result<Vec<T>, CustodyError> {
        let results: Vec<_> = self.validators.iter().map(|v| tx(&v.service)).collect();
        let ok = results.iter().filter(|r| r.is_ok()).count();
        assert!(
            ok == 0 || ok == results.len(),
            "replicas disagree: {} of {} succeeded",
            ok,
            results.len()
        );
        results.into_iter().collect()
    }

    /// Assert every replica holds the same bytes.
    pub fn assert_replicas_identical(&self) {
        let first = snapshot(&self.validators[0].chain);
        for (i, v) in self.validators.iter().enumerate().skip(1) {
            assert_eq!(snapshot(&v.chain), first, "replica {} diverged", i);
        }
    }
}

/// Co-signer key of validator `i`.
pub fn signer_key(i: u8) -> Vec<u8> {
    vec![0x02, 0xA0, i]
}

/// Every key/value pair of a replica, in key order.
pub fn snapshot(chain: &GasMeteredState<InMemoryChainState>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::new();
    chain
        .inner()
        .iterate_range(&[], &[0xFF; 64], true, &mut |k, v| {
            out.push((k.to_vec(), v.to_vec()));
            ControlFlow::Continue(())
        })
        .expect("in-memory scan");
    out
}
