//! # Lifecycle Phases
//!
//! Bookkeeping shared by the Ethereum and Bitcoin handlers. Each chain module
//! wraps these in its own `fn` handlers so the engine stays typed per chain.
//!
//! Every phase follows the same pattern: verify the source state, create the
//! phase's job unless this validator already voted, then advance only once the
//! phase's quorum condition holds.

use super::context::{TrackerContext, TrackerEngine};
use crate::domain::{
    transitions, CustodyError, Edge, ForeignChain, Handler, Job, JobId, JobKind, ResultExt,
    Status, TrackerState, Transition, TransitionError,
};
use tracing::{debug, info};

/// One handler per lifecycle transition.
pub(crate) struct PhaseHandlers {
    pub broadcasting: Handler<TrackerContext, CustodyError>,
    pub finalizing: Handler<TrackerContext, CustodyError>,
    pub finalize: Handler<TrackerContext, CustodyError>,
    pub minting: Handler<TrackerContext, CustodyError>,
    pub cleanup: Handler<TrackerContext, CustodyError>,
}

/// Build the `New → … → Minted → (deleted)` engine around `handlers`.
pub(crate) fn lifecycle_engine(handlers: PhaseHandlers) -> Result<TrackerEngine, TransitionError> {
    let mut engine = TrackerEngine::new(TrackerState::ALL.map(TrackerState::status))?;

    let edges = [
        (
            transitions::BROADCASTING,
            TrackerState::New.status(),
            TrackerState::BusyBroadcasting.status(),
            handlers.broadcasting,
        ),
        (
            transitions::FINALIZING,
            TrackerState::BusyBroadcasting.status(),
            TrackerState::BusyFinalizing.status(),
            handlers.finalizing,
        ),
        (
            transitions::FINALIZE,
            TrackerState::BusyFinalizing.status(),
            TrackerState::Finalized.status(),
            handlers.finalize,
        ),
        (
            transitions::MINTING,
            TrackerState::Finalized.status(),
            TrackerState::Minted.status(),
            handlers.minting,
        ),
        (
            transitions::CLEANUP,
            TrackerState::Minted.status(),
            Status::DELETED,
            handlers.cleanup,
        ),
    ];

    for (name, from, to, handler) in edges {
        engine.register(Transition {
            name,
            from,
            to,
            handler,
        })?;
    }
    Ok(engine)
}

fn tracker_state(status: Status) -> Result<TrackerState, CustodyError> {
    TrackerState::try_from(status).map_err(|s| CustodyError::UnknownStatus(s.0))
}

/// Reject a tracker of the wrong chain or outside the edge's source state.
pub(crate) fn ensure_source(
    ctx: &TrackerContext,
    chain: ForeignChain,
    transition: &'static str,
    edge: Edge,
) -> Result<(), CustodyError> {
    let actual_chain = ctx.tracker.chain();
    if actual_chain != chain {
        return Err(CustodyError::ContextMismatch {
            handler: transition,
            expected: chain,
            actual: actual_chain,
        });
    }

    let expected = tracker_state(edge.from)?;
    if ctx.tracker.state != expected {
        return Err(CustodyError::InvalidState {
            transition,
            expected,
            actual: ctx.tracker.state,
        });
    }
    Ok(())
}

/// Create a job for the current tracker unless one already exists.
pub(crate) fn create_job(
    ctx: &TrackerContext,
    kind: JobKind,
    target: TrackerState,
) -> Result<(), CustodyError> {
    let job = Job::new(kind, ctx.tracker.name.clone(), target);
    ctx.jobs
        .create_if_absent(&job)
        .context("job creation failed")?;
    Ok(())
}

/// Advance to the edge's target and start the broadcast job.
pub(crate) fn start_broadcast(
    ctx: &mut TrackerContext,
    chain: ForeignChain,
    edge: Edge,
) -> Result<(), CustodyError> {
    let to = tracker_state(edge.to)?;
    create_job(ctx, JobKind::broadcast(chain), to)?;
    ctx.tracker.state = to;
    info!(
        tracker = %ctx.tracker.name,
        chain = %chain,
        "[qc-15] Broadcasting started"
    );
    Ok(())
}

/// Whether this validator's broadcast job for the tracker completed.
///
/// Jobs are local, so a missing job reads as not done instead of failing a
/// replicated transition on this validator only.
fn broadcast_done(ctx: &TrackerContext, target: TrackerState) -> Result<bool, CustodyError> {
    let id = JobId::new(ctx.tracker.chain(), &ctx.tracker.name, target);
    match ctx.jobs.get_job(&id) {
        Ok(job) => Ok(job.is_done()),
        Err(CustodyError::JobNotFound(id)) => {
            debug!(job = %id, "[qc-15] No local broadcast job");
            Ok(false)
        }
        Err(e) => Err(e.context("failed to get broadcast job")),
    }
}

/// Wait for the broadcast to land, then for the first finality vote.
pub(crate) fn finalizing(
    ctx: &mut TrackerContext,
    chain: ForeignChain,
    edge: Edge,
) -> Result<(), CustodyError> {
    ensure_source(ctx, chain, transitions::FINALIZING, edge)?;
    let from = tracker_state(edge.from)?;
    let to = tracker_state(edge.to)?;

    if !ctx.has_voted() && broadcast_done(ctx, from)? {
        create_job(ctx, JobKind::check_finality(chain), to)?;
    }

    if ctx.tracker.votes() > 0 {
        ctx.tracker.state = to;
        debug!(
            tracker = %ctx.tracker.name,
            votes = ctx.tracker.votes(),
            "[qc-15] Finality check started"
        );
    }
    Ok(())
}

/// Keep the finality check alive until the chain's predicate holds.
pub(crate) fn finalize(
    ctx: &mut TrackerContext,
    chain: ForeignChain,
    edge: Edge,
) -> Result<(), CustodyError> {
    ensure_source(ctx, chain, transitions::FINALIZE, edge)?;
    let from = tracker_state(edge.from)?;

    if !ctx.has_voted() {
        create_job(ctx, JobKind::check_finality(chain), from)?;
    }

    if ctx.tracker.finalized() {
        ctx.tracker.state = tracker_state(edge.to)?;
        info!(
            tracker = %ctx.tracker.name,
            votes = ctx.tracker.votes(),
            required = ctx.tracker.required_votes,
            "[qc-15] Tracker finalized"
        );
    }
    Ok(())
}

/// Advance once the minting / release task completed.
pub(crate) fn minting(
    ctx: &mut TrackerContext,
    chain: ForeignChain,
    edge: Edge,
) -> Result<(), CustodyError> {
    ensure_source(ctx, chain, transitions::MINTING, edge)?;

    if ctx.tracker.task_completed {
        ctx.tracker.state = tracker_state(edge.to)?;
        info!(tracker = %ctx.tracker.name, "[qc-15] Tracker minted");
    }
    Ok(())
}

/// Delete the tracker's jobs, then the tracker itself.
///
/// Jobs are local, so a job this validator never created is skipped. Any
/// store failure propagates.
pub(crate) fn cleanup(
    ctx: &mut TrackerContext,
    chain: ForeignChain,
    edge: Edge,
    job_targets: &[TrackerState],
) -> Result<(), CustodyError> {
    ensure_source(ctx, chain, transitions::CLEANUP, edge)?;
    let name = ctx.tracker.name.clone();

    for target in job_targets {
        let removed = ctx
            .jobs
            .delete_by_id(&JobId::new(chain, &name, *target))
            .context("job cleanup failed")?;
        if !removed {
            debug!(tracker = %name, target = %target, "[qc-15] No job to clean up");
        }
    }

    if !ctx
        .trackers
        .delete(&name)
        .context("tracker delete failed")?
    {
        return Err(CustodyError::TrackerNotFound(name));
    }

    info!(tracker = %name, chain = %chain, "[qc-15] Tracker cleaned up");
    Ok(())
}
