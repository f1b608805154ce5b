//! # Custody Flow Tests
//!
//! Drives trackers through their full lifecycle on a simulated network of
//! validators:
//!
//! ```text
//! [Tx pipeline] ──transition──→ [CustodyService × N] ──jobs──→ [JobRunner × N]
//!       ↑                                                           │
//!       └──────────── votes / signatures / task completed ──────────┘
//! ```
//!
//! ## Test Categories
//!
//! 1. **Happy Path**: Ethereum and Bitcoin trackers from `New` to deleted
//! 2. **Retry Exhaustion**: A job that never succeeds halts its tracker
//! 3. **Gas Exhaustion**: A failed write leaves every replica unchanged

#[cfg(test)]
mod tests {
    use super::super::fixtures::{signer_key, Network};
    use qc_15_custody_bridge::{
        transitions, BtcSignature, ChainDetails, CustodyBridgeApi, CustodyConfig, CustodyError,
        ForeignChain, JobId, JobKind, JobStatus, MockJobExecutor, StoreError, TrackerState,
        MAX_JOB_RETRIES,
    };

    const ETH: ForeignChain = ForeignChain::Ethereum;
    const BTC: ForeignChain = ForeignChain::Bitcoin;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn config() -> CustodyConfig {
        let mut config = CustodyConfig::default();
        config.ethereum.required_votes = 2;
        config.bitcoin.required_votes = 2;
        config
    }

    fn eth_details() -> ChainDetails {
        ChainDetails::Ethereum {
            contract_address: vec![0xCC; 20],
            raw_tx: vec![0xF8, 0x6B, 0x80],
            tx_hash: Some([0x11; 32]),
        }
    }

    fn btc_details(validators: u8) -> ChainDetails {
        ChainDetails::Bitcoin {
            signers: (0..validators).map(signer_key).collect(),
            lock_script_address: vec![0xAB; 20],
            process_tx: vec![0x02, 0x00, 0x00, 0x00],
            multisig: None,
        }
    }

    fn state(net: &Network, chain: ForeignChain, name: &str) -> TrackerState {
        net.validator(0)
            .service
            .get_tracker(chain, name)
            .expect("tracker exists")
            .state
    }

    async fn run_all_jobs(net: &Network) {
        for v in &net.validators {
            v.runner
                .run_once(&MockJobExecutor::default())
                .await
                .expect("job pass");
        }
    }

    fn apply(net: &Network, chain: ForeignChain, name: &str, transition: &'static str) {
        net.begin_block();
        net.submit(|svc| svc.apply_transition(chain, name, transition))
            .expect("transition applies");
        net.assert_replicas_identical();
    }

    fn vote(net: &Network, chain: ForeignChain, name: &str, voter: usize) {
        let address = net.validator(voter).address;
        net.begin_block();
        net.submit(|svc| svc.record_vote(chain, name, address))
            .expect("vote recorded");
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_ethereum_tracker_full_lifecycle() {
        let net = Network::new(3, config());
        net.submit(|svc| svc.open_tracker("eth-1", eth_details()))
            .unwrap();
        net.submit(|svc| svc.credit_lock(ETH, 100)).unwrap();

        apply(&net, ETH, "eth-1", transitions::BROADCASTING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::BusyBroadcasting);
        for v in &net.validators {
            let jobs = v.service.jobs().jobs_for_tracker(ETH, "eth-1").unwrap();
            assert_eq!(jobs.len(), 1);
            assert_eq!(jobs[0].kind, JobKind::EthBroadcast);
        }

        // Broadcast lands; the next FINALIZING asks every validator to watch it.
        run_all_jobs(&net).await;
        apply(&net, ETH, "eth-1", transitions::FINALIZING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::BusyBroadcasting);
        let cf = JobId::new(ETH, "eth-1", TrackerState::BusyFinalizing);
        for v in &net.validators {
            assert_eq!(v.service.get_job(&cf).unwrap().kind, JobKind::EthCheckFinality);
        }

        run_all_jobs(&net).await;
        vote(&net, ETH, "eth-1", 0);
        apply(&net, ETH, "eth-1", transitions::FINALIZING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::BusyFinalizing);

        apply(&net, ETH, "eth-1", transitions::FINALIZE);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::BusyFinalizing);
        vote(&net, ETH, "eth-1", 1);
        vote(&net, ETH, "eth-1", 1);
        apply(&net, ETH, "eth-1", transitions::FINALIZE);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::Finalized);

        apply(&net, ETH, "eth-1", transitions::MINTING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::Finalized);
        net.submit(|svc| svc.mark_task_completed(ETH, "eth-1"))
            .unwrap();
        apply(&net, ETH, "eth-1", transitions::MINTING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::Minted);

        net.begin_block();
        let results = net
            .submit(|svc| svc.apply_transition(ETH, "eth-1", transitions::CLEANUP))
            .unwrap();
        assert!(results.iter().all(Option::is_none));
        for v in &net.validators {
            assert!(matches!(
                v.service.get_tracker(ETH, "eth-1"),
                Err(CustodyError::TrackerNotFound(_))
            ));
            assert!(v.service.jobs().jobs_for_tracker(ETH, "eth-1").unwrap().is_empty());
        }
        net.assert_replicas_identical();
    }

    #[tokio::test]
    async fn test_bitcoin_release_collects_signatures_first() {
        let net = Network::new(3, config());
        net.submit(|svc| svc.open_tracker("btc-1", btc_details(3)))
            .unwrap();
        net.submit(|svc| svc.begin_release("btc-1", b"release-tx".to_vec(), 2))
            .unwrap();

        // Not enough signatures: every co-signer is asked for one.
        apply(&net, BTC, "btc-1", transitions::BROADCASTING);
        assert_eq!(state(&net, BTC, "btc-1"), TrackerState::New);
        let sign_job = JobId::new(BTC, "btc-1", TrackerState::New);
        for v in &net.validators {
            assert_eq!(v.service.get_job(&sign_job).unwrap().kind, JobKind::AddSignature);
        }

        for i in [2u8, 0] {
            let sig = BtcSignature {
                index: i as usize,
                address: signer_key(i),
                sign: vec![0x30, 0x44, i],
            };
            net.submit(|svc| svc.add_signature("btc-1", sig.clone()))
                .unwrap();
        }
        let stored = net.validator(1).service.get_tracker(BTC, "btc-1").unwrap();
        let multisig = stored.multisig().unwrap();
        assert!(multisig.is_valid());
        assert_eq!(
            multisig.signatures_in_order(),
            vec![vec![0x30, 0x44, 0], vec![0x30, 0x44, 2]]
        );

        apply(&net, BTC, "btc-1", transitions::BROADCASTING);
        assert_eq!(state(&net, BTC, "btc-1"), TrackerState::BusyBroadcasting);

        run_all_jobs(&net).await;
        vote(&net, BTC, "btc-1", 2);
        apply(&net, BTC, "btc-1", transitions::FINALIZING);
        vote(&net, BTC, "btc-1", 0);
        apply(&net, BTC, "btc-1", transitions::FINALIZE);
        assert_eq!(state(&net, BTC, "btc-1"), TrackerState::Finalized);

        net.submit(|svc| svc.mark_task_completed(BTC, "btc-1"))
            .unwrap();
        apply(&net, BTC, "btc-1", transitions::MINTING);
        apply(&net, BTC, "btc-1", transitions::CLEANUP);

        for v in &net.validators {
            assert!(v.service.jobs().jobs_for_tracker(BTC, "btc-1").unwrap().is_empty());
        }
    }

    #[test]
    fn test_reapplied_broadcast_creates_no_second_job() {
        let net = Network::new(2, config());
        net.submit(|svc| svc.open_tracker("eth-1", eth_details()))
            .unwrap();
        apply(&net, ETH, "eth-1", transitions::BROADCASTING);

        let err = net
            .submit(|svc| svc.apply_transition(ETH, "eth-1", transitions::BROADCASTING))
            .unwrap_err();
        assert!(matches!(err, CustodyError::InvalidState { .. }));
        for v in &net.validators {
            assert_eq!(v.service.jobs().jobs_for_tracker(ETH, "eth-1").unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_cleanup_leaves_same_named_tracker_on_other_chain() {
        let net = Network::new(2, config());
        net.submit(|svc| svc.open_tracker("x", eth_details()))
            .unwrap();
        net.submit(|svc| svc.open_tracker("x", btc_details(2)))
            .unwrap();
        net.submit(|svc| svc.begin_release("x", b"release-tx".to_vec(), 0))
            .unwrap();
        apply(&net, ETH, "x", transitions::BROADCASTING);
        apply(&net, BTC, "x", transitions::BROADCASTING);

        run_all_jobs(&net).await;
        vote(&net, ETH, "x", 0);
        apply(&net, ETH, "x", transitions::FINALIZING);
        vote(&net, ETH, "x", 1);
        apply(&net, ETH, "x", transitions::FINALIZE);
        net.submit(|svc| svc.mark_task_completed(ETH, "x")).unwrap();
        apply(&net, ETH, "x", transitions::MINTING);
        apply(&net, ETH, "x", transitions::CLEANUP);

        assert_eq!(state(&net, BTC, "x"), TrackerState::BusyBroadcasting);
        for v in &net.validators {
            assert!(v.service.jobs().jobs_for_tracker(ETH, "x").unwrap().is_empty());
            let btc_jobs = v.service.jobs().jobs_for_tracker(BTC, "x").unwrap();
            assert!(btc_jobs.iter().any(|j| j.kind == JobKind::BtcBroadcast));
        }
    }

    #[test]
    fn test_locks_spread_across_trackers() {
        let net = Network::new(2, config());
        for name in ["a", "b", "c"] {
            net.submit(|svc| svc.open_tracker(name, eth_details()))
                .unwrap();
        }
        let picked: Vec<String> = [30, 20, 10, 5]
            .into_iter()
            .map(|amount| {
                net.submit(|svc| svc.credit_lock(ETH, amount)).unwrap()[0]
                    .name
                    .clone()
            })
            .collect();
        assert_eq!(picked, vec!["a", "b", "c", "c"]);
        net.assert_replicas_identical();
    }

    // =============================================================================
    // RETRY EXHAUSTION
    // =============================================================================

    #[tokio::test]
    async fn test_exhausted_broadcast_halts_tracker() {
        let net = Network::new(1, config());
        net.submit(|svc| svc.open_tracker("eth-1", eth_details()))
            .unwrap();
        apply(&net, ETH, "eth-1", transitions::BROADCASTING);

        let v = net.validator(0);
        let executor = MockJobExecutor::failing("eth-1", u32::MAX);
        let mut statuses = Vec::new();
        for _ in 0..MAX_JOB_RETRIES + 2 {
            statuses.extend(
                v.runner
                    .run_once(&executor)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|o| o.status),
            );
        }
        assert_eq!(statuses.len(), MAX_JOB_RETRIES as usize);
        assert_eq!(statuses.last(), Some(&JobStatus::Exhausted));

        apply(&net, ETH, "eth-1", transitions::FINALIZING);
        assert_eq!(state(&net, ETH, "eth-1"), TrackerState::BusyBroadcasting);
        assert!(matches!(
            v.service
                .get_job(&JobId::new(ETH, "eth-1", TrackerState::BusyFinalizing)),
            Err(CustodyError::JobNotFound(_))
        ));
        assert!(matches!(
            v.service
                .jobs()
                .record_failure(&JobId::new(ETH, "eth-1", TrackerState::BusyBroadcasting)),
            Err(CustodyError::JobExhausted { retries: 10, .. })
        ));
    }

    // =============================================================================
    // GAS EXHAUSTION
    // =============================================================================

    #[test]
    fn test_out_of_gas_block_leaves_replicas_unchanged() {
        let net = Network::new(3, config());
        net.submit(|svc| svc.open_tracker("eth-1", eth_details()))
            .unwrap();
        let before = super::super::fixtures::snapshot(&net.validator(0).chain);

        net.begin_block_with_gas(10);
        let err = net
            .submit(|svc| svc.record_vote(ETH, "eth-1", [9; 20]))
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err.root(),
            CustodyError::Store(StoreError::GasLimitExceeded { .. })
        ));
        assert_eq!(super::super::fixtures::snapshot(&net.validator(0).chain), before);
        net.assert_replicas_identical();

        net.begin_block();
        let updated = net
            .submit(|svc| svc.record_vote(ETH, "eth-1", [9; 20]))
            .unwrap();
        assert_eq!(updated[0].votes(), 1);
    }
}
