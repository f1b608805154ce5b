//! # Job Runner
//!
//! The validator's off-chain loop. Each pass hands every pending job to the
//! executor and records the attempt in the local job store. Results reach the
//! chain only as new transactions submitted by the caller.

use crate::adapters::JobStore;
use crate::domain::{CustodyError, JobId, JobKind, RetryOutcome};
use crate::ports::{ExecutionResult, JobExecutor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// What happened to one job during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    /// Action completed, job marked done.
    Completed,
    /// Attempt failed; the job will run again.
    Retrying {
        /// Attempts left
        remaining: u32,
    },
    /// Attempt failed and the job hit its retry bound.
    Exhausted,
}

/// Per-job result of a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobOutcome {
    /// Job key
    pub id: JobId,
    /// Job type
    pub kind: JobKind,
    /// Result
    pub status: JobStatus,
}

/// Polls the local job store and drives jobs through an executor.
pub struct JobRunner {
    jobs: Arc<JobStore>,
}

impl JobRunner {
    /// Runner over `jobs`.
    pub fn new(jobs: Arc<JobStore>) -> Self {
        Self { jobs }
    }

    /// Run every pending job once.
    ///
    /// A job removed while it was executing (its tracker was cleaned up) is
    /// skipped and the pass continues with the next one.
    pub async fn run_once(
        &self,
        executor: &dyn JobExecutor,
    ) -> Result<Vec<JobOutcome>, CustodyError> {
        let pending = self.jobs.pending_jobs()?;
        let mut outcomes = Vec::with_capacity(pending.len());

        for job in pending {
            let id = job.id();
            let recorded = match executor.execute(&job).await {
                ExecutionResult::Completed => self.jobs.mark_done(&id).map(|_| {
                    debug!(job = %id, kind = job.kind.name(), "[qc-15] Job completed");
                    JobStatus::Completed
                }),
                ExecutionResult::Failed(reason) => {
                    self.jobs.record_failure(&id).map(|outcome| match outcome {
                        RetryOutcome::Retry { remaining } => {
                            warn!(job = %id, reason = %reason, remaining, "[qc-15] Job failed");
                            JobStatus::Retrying { remaining }
                        }
                        RetryOutcome::Exhausted => {
                            error!(job = %id, reason = %reason, "[qc-15] Job failed permanently");
                            JobStatus::Exhausted
                        }
                    })
                }
            };
            let status = match recorded {
                Ok(status) => status,
                Err(e) if matches!(e.root(), CustodyError::JobNotFound(_)) => {
                    debug!(job = %id, "[qc-15] Job removed during execution, skipped");
                    continue;
                }
                Err(e) => return Err(e),
            };
            outcomes.push(JobOutcome {
                id,
                kind: job.kind,
                status,
            });
        }
        Ok(outcomes)
    }

    /// Poll every `interval` until `shutdown` flips to true.
    ///
    /// A failing pass is logged and the loop keeps going.
    pub async fn run(
        &self,
        executor: &dyn JobExecutor,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        info!(interval_ms = interval.as_millis() as u64, "[qc-15] Job runner started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(executor).await {
                        error!(error = %e, "[qc-15] Job pass failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("[qc-15] Job runner stopped");
    }
}
