//! # Bitcoin Tracker Handlers
//!
//! Releasing jointly held Bitcoin needs `M` co-signer signatures before the
//! release transaction can be broadcast. `BROADCASTING` therefore holds the
//! tracker in `New` while signatures are collected, asking each co-signer that
//! has not signed yet for its partial signature through an `AddSignature` job.

use super::context::{TrackerContext, TrackerEngine};
use super::phases::{self, PhaseHandlers};
use crate::domain::{
    transitions, CustodyError, Edge, ForeignChain, JobKind, TrackerState, TransitionError,
};
use tracing::debug;

const CHAIN: ForeignChain = ForeignChain::Bitcoin;

/// Build the Bitcoin tracker engine.
pub fn build_bitcoin_engine() -> Result<TrackerEngine, TransitionError> {
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

    let multisig = ctx
        .tracker
        .multisig()
        .ok_or_else(|| CustodyError::NoReleaseInProgress(ctx.tracker.name.clone()))?;

    if multisig.is_valid() {
        return phases::start_broadcast(ctx, CHAIN, edge);
    }

    let must_sign = ctx.signer_key.as_deref().is_some_and(|key| {
        multisig.signer_index(key).is_ok() && !multisig.has_address_signed(key)
    });
    debug!(
        tracker = %ctx.tracker.name,
        signed = multisig.signed_count(),
        threshold = multisig.threshold(),
        must_sign,
        "[qc-15] Release waiting for signatures"
    );
    if must_sign {
        phases::create_job(ctx, JobKind::AddSignature, TrackerState::New)?;
    }
    Ok(())
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
        &[
            TrackerState::New,
            TrackerState::BusyBroadcasting,
            TrackerState::BusyFinalizing,
        ],
    )
}
