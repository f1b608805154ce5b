//! # Ethereum Tracker Handlers
//!
//! An Ethereum lock moves through the lifecycle as soon as its transaction is
//! broadcast; finality is a plain vote quorum.

use super::context::{TrackerContext, TrackerEngine};
use super::phases::{self, PhaseHandlers};
use crate::domain::{transitions, CustodyError, Edge, ForeignChain, TrackerState, TransitionError};

const CHAIN: ForeignChain = ForeignChain::Ethereum;

/// Build the Ethereum tracker engine.
pub fn build_ethereum_engine() -> Result<TrackerEngine, TransitionError> {
    phases::lifecycle_engine(PhaseHandlers {
        broadcasting,
        finalizing,
        finalize,
        minting,
        cleanup,
    })
}

fn broadcasting(ctx: &mut TrackerContext, edge: Edge) -> Result<(), CustodyError> {
    phases::ensure_source(ctx, CHAIN, transitions::BROADCASTING, edge)?;
    phases::start_broadcast(ctx, CHAIN, edge)
}

fn finalizing(ctx: &mut TrackerContext, edge: Edge) -> Result<(), CustodyError> {
    phases::finalizing(ctx, CHAIN, edge)
}

fn finalize(ctx: &mut TrackerContext, edge: Edge) -> Result<(), CustodyError> {
    phases::finalize(ctx, CHAIN, edge)
}

fn minting(ctx: &mut TrackerContext, edge: Edge) -> Result<(), CustodyError> {
    phases::minting(ctx, CHAIN, edge)
}

fn cleanup(ctx: &mut TrackerContext, edge: Edge) -> Result<(), CustodyError> {
    phases::cleanup(
        ctx,
        CHAIN,
        edge,
        &[TrackerState::BusyBroadcasting, TrackerState::BusyFinalizing],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChainState, JobStore, TrackerStore};
    use crate::domain::{ChainDetails, JobId, JobKind, Tracker, MAX_JOB_RETRIES};
    use std::sync::Arc;

    const ME: [u8; 20] = [1u8; 20];
    const OTHER: [u8; 20] = [2u8; 20];

    struct Harness {
        engine: TrackerEngine,
        jobs: Arc<JobStore>,
        trackers: Arc<TrackerStore>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                engine: build_ethereum_engine().unwrap(),
                jobs: Arc::new(JobStore::new(
                    Arc::new(InMemoryChainState::new()),
                    MAX_JOB_RETRIES,
                )),
                trackers: Arc::new(TrackerStore::new(
                    Arc::new(InMemoryChainState::new()),
                    "eth_tracker_",
                )),
            }
        }

        fn ctx(&self, tracker: Tracker) -> TrackerContext {
            TrackerContext::new(tracker, self.jobs.clone(), self.trackers.clone(), ME)
        }
    }

    fn tracker() -> Tracker {
        Tracker::new(
            "eth-1",
            2,
            ChainDetails::Ethereum {
                contract_address: vec![0xCC; 20],
                raw_tx: vec![0xF8],
                tx_hash: None,
            },
        )
    }

    #[test]
    fn test_engine_shape() {
        let engine = build_ethereum_engine().unwrap();
        assert_eq!(engine.len(), 5);
        let cleanup = engine.transition(transitions::CLEANUP).unwrap();
        assert!(cleanup.to.is_deleted());
        for state in TrackerState::ALL {
            assert_eq!(engine.transitions_from(state.status()).len(), 1);
        }
    }

    #[test]
    fn test_broadcasting_creates_one_job_and_rejects_reapply() {
        let h = Harness::new();
        let mut ctx = h.ctx(tracker());

        h.engine.apply(transitions::BROADCASTING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::BusyBroadcasting);
        assert_eq!(h.jobs.jobs_for_tracker(ForeignChain::Ethereum, "eth-1").unwrap().len(), 1);

        let err = h
            .engine
            .apply(transitions::BROADCASTING, &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InvalidState {
                expected: TrackerState::New,
                actual: TrackerState::BusyBroadcasting,
                ..
            }
        ));
        assert_eq!(ctx.tracker.state, TrackerState::BusyBroadcasting);
        assert_eq!(h.jobs.jobs_for_tracker(ForeignChain::Ethereum, "eth-1").unwrap().len(), 1);
    }

    #[test]
    fn test_finalizing_waits_for_broadcast_and_vote() {
        let h = Harness::new();
        let mut ctx = h.ctx(tracker());
        h.engine.apply(transitions::BROADCASTING, &mut ctx).unwrap();

        // Broadcast not done: no finality job, no votes: no advance.
        h.engine.apply(transitions::FINALIZING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::BusyBroadcasting);
        let cf_id = JobId::new(ForeignChain::Ethereum, "eth-1", TrackerState::BusyFinalizing);
        assert!(!h.jobs.has_job(&cf_id).unwrap());

        h.jobs
            .mark_done(&JobId::new(ForeignChain::Ethereum, "eth-1", TrackerState::BusyBroadcasting))
            .unwrap();
        h.engine.apply(transitions::FINALIZING, &mut ctx).unwrap();
        assert_eq!(h.jobs.get_job(&cf_id).unwrap().kind, JobKind::EthCheckFinality);
        assert_eq!(ctx.tracker.state, TrackerState::BusyBroadcasting);

        ctx.tracker.add_vote(OTHER);
        h.engine.apply(transitions::FINALIZING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::BusyFinalizing);
    }

    #[test]
    fn test_voter_skips_job_lookup() {
        let h = Harness::new();
        let mut t = tracker();
        t.state = TrackerState::BusyBroadcasting;
        t.add_vote(ME);
        let mut ctx = h.ctx(t);

        // No broadcast job exists locally; a validator that voted never asks for it.
        h.engine.apply(transitions::FINALIZING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::BusyFinalizing);
    }

    #[test]
    fn test_finalize_needs_quorum() {
        let h = Harness::new();
        let mut t = tracker();
        t.state = TrackerState::BusyFinalizing;
        t.add_vote(OTHER);
        let mut ctx = h.ctx(t);

        h.engine.apply(transitions::FINALIZE, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::BusyFinalizing);
        assert!(h
            .jobs
            .has_job(&JobId::new(ForeignChain::Ethereum, "eth-1", TrackerState::BusyFinalizing))
            .unwrap());

        ctx.tracker.add_vote(ME);
        h.engine.apply(transitions::FINALIZE, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::Finalized);
    }

    #[test]
    fn test_minting_needs_completion() {
        let h = Harness::new();
        let mut t = tracker();
        t.state = TrackerState::Finalized;
        let mut ctx = h.ctx(t);

        h.engine.apply(transitions::MINTING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::Finalized);

        ctx.tracker.task_completed = true;
        h.engine.apply(transitions::MINTING, &mut ctx).unwrap();
        assert_eq!(ctx.tracker.state, TrackerState::Minted);
    }

    #[test]
    fn test_cleanup_removes_jobs_and_tracker() {
        let h = Harness::new();
        let mut t = tracker();
        t.state = TrackerState::Minted;
        h.trackers.set_tracker("eth-1", &t).unwrap();
        h.jobs
            .save_job(&crate::domain::Job::new(
                JobKind::EthBroadcast,
                "eth-1",
                TrackerState::BusyBroadcasting,
            ))
            .unwrap();
        let mut ctx = h.ctx(t);

        h.engine.apply(transitions::CLEANUP, &mut ctx).unwrap();
        assert!(h.jobs.jobs_for_tracker(ForeignChain::Ethereum, "eth-1").unwrap().is_empty());
        assert!(!h.trackers.exists("eth-1").unwrap());
    }

    #[test]
    fn test_bitcoin_tracker_rejected() {
        let h = Harness::new();
        let t = Tracker::new(
            "btc-1",
            1,
            ChainDetails::Bitcoin {
                signers: vec![vec![2, 1]],
                lock_script_address: vec![0xAB; 20],
                process_tx: vec![],
                multisig: None,
            },
        );
        let mut ctx = h.ctx(t);
        let err = h
            .engine
            .apply(transitions::BROADCASTING, &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            CustodyError::ContextMismatch {
                expected: ForeignChain::Ethereum,
                actual: ForeignChain::Bitcoin,
                ..
            }
        ));
        assert_eq!(ctx.tracker.state, TrackerState::New);
    }

    #[test]
    fn test_unknown_transition() {
        let h = Harness::new();
        let mut ctx = h.ctx(tracker());
        assert!(matches!(
            h.engine.apply("REFUND", &mut ctx),
            Err(CustodyError::Transition(TransitionError::UnknownTransition(_)))
        ));
    }
}
