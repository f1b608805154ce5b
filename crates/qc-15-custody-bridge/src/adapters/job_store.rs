//! Job Store Adapter
//!
//! Persists jobs in the validator-local store under `job_` + the job's
//! deterministic key. Job presence differs between validators (it depends on
//! whether this validator already voted), so this store must never be the
//! replicated chain state.
//!
//! The job runner and block processing share the store. Every write goes
//! through one lock, so an update never brings back a job that cleanup
//! removed mid-update.

use crate::adapters::JsonCodec;
use crate::domain::{CustodyError, ForeignChain, Job, JobId, ResultExt, RetryOutcome};
use crate::ports::{ChainState, Serializer};
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracing::{debug, error, info};

const JOB_PREFIX: &[u8] = b"job_";

/// Local job persistence.
pub struct JobStore {
    state: Arc<dyn ChainState>,
    codec: JsonCodec,
    max_retries: u32,
    write_lock: Mutex<()>,
}

impl JobStore {
    /// Store over `state` with the given retry bound.
    pub fn new(state: Arc<dyn ChainState>, max_retries: u32) -> Self {
        Self {
            state,
            codec: JsonCodec,
            max_retries,
            write_lock: Mutex::new(()),
        }
    }

    /// Configured retry bound.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn key(id: &JobId) -> Vec<u8> {
        let mut key = JOB_PREFIX.to_vec();
        key.extend_from_slice(id.as_str().as_bytes());
        key
    }

    /// Persist `job` under its key, overwriting any previous record.
    pub fn save_job(&self, job: &Job) -> Result<(), CustodyError> {
        let _guard = self.write_lock.lock();
        self.write(job)
    }

    fn write(&self, job: &Job) -> Result<(), CustodyError> {
        let bytes = self
            .codec
            .serialize(job)
            .context("job serialization failed")?;
        self.state
            .set(&Self::key(&job.id()), bytes)
            .context("job write failed")
    }

    /// Save `job` unless a job with the same key exists. Returns whether it was created.
    pub fn create_if_absent(&self, job: &Job) -> Result<bool, CustodyError> {
        let id = job.id();
        let _guard = self.write_lock.lock();
        if self.state.exists(&Self::key(&id))? {
            debug!("[qc-15] Job {} already exists", id);
            return Ok(false);
        }
        self.write(job)?;
        info!(job = %id, kind = job.kind.name(), "[qc-15] Job created");
        Ok(true)
    }

    /// Load a job.
    pub fn get_job(&self, id: &JobId) -> Result<Job, CustodyError> {
        let bytes = self
            .state
            .get(&Self::key(id))?
            .ok_or_else(|| CustodyError::JobNotFound(id.to_string()))?;
        self.codec
            .deserialize(&bytes)
            .context("job deserialization failed")
    }

    /// Whether a job exists.
    pub fn has_job(&self, id: &JobId) -> Result<bool, CustodyError> {
        Ok(self.state.exists(&Self::key(id))?)
    }

    /// Remove `job`'s record.
    pub fn delete_job(&self, job: &Job) -> Result<(), CustodyError> {
        self.delete_by_id(&job.id())?;
        Ok(())
    }

    /// Remove a job if present. Returns whether a record was removed.
    pub fn delete_by_id(&self, id: &JobId) -> Result<bool, CustodyError> {
        let _guard = self.write_lock.lock();
        let removed = self
            .state
            .remove(&Self::key(id))
            .context("job delete failed")?;
        Ok(removed.is_some())
    }

    /// Mark a job's off-chain action complete.
    ///
    /// Fails with `JobNotFound` without writing if the job is gone.
    pub fn mark_done(&self, id: &JobId) -> Result<Job, CustodyError> {
        let _guard = self.write_lock.lock();
        let mut job = self.get_job(id)?;
        job.mark_done();
        self.write(&job)?;
        Ok(job)
    }

    /// Count a failed attempt.
    ///
    /// Fails with `JobExhausted` if the job had already reached the bound, so a
    /// caller can never push it to an extra attempt. Fails with `JobNotFound`
    /// without writing if the job is gone.
    pub fn record_failure(&self, id: &JobId) -> Result<RetryOutcome, CustodyError> {
        let _guard = self.write_lock.lock();
        let mut job = self.get_job(id)?;
        if job.is_exhausted(self.max_retries) {
            return Err(CustodyError::JobExhausted {
                job_id: id.to_string(),
                retries: job.retry_count,
            });
        }

        let outcome = job.record_failure(self.max_retries);
        self.write(&job)?;

        if outcome == RetryOutcome::Exhausted {
            error!(
                job = %id,
                tracker = %job.tracker_name,
                retries = job.retry_count,
                "[qc-15] Job exhausted retries, tracker will not advance"
            );
        }
        Ok(outcome)
    }

    /// Jobs still eligible for execution, in key order.
    pub fn pending_jobs(&self) -> Result<Vec<Job>, CustodyError> {
        let max = self.max_retries;
        Ok(self
            .scan(JOB_PREFIX)?
            .into_iter()
            .filter(|job| job.is_pending(max))
            .collect())
    }

    /// Every job of `chain`'s tracker `tracker_name`, in key order.
    pub fn jobs_for_tracker(
        &self,
        chain: ForeignChain,
        tracker_name: &str,
    ) -> Result<Vec<Job>, CustodyError> {
        let mut prefix = JOB_PREFIX.to_vec();
        prefix.extend_from_slice(JobId::tracker_prefix(chain, tracker_name).as_bytes());
        self.scan(&prefix)
    }

    fn scan(&self, prefix: &[u8]) -> Result<Vec<Job>, CustodyError> {
        let end = prefix_end(prefix);
        let mut jobs = Vec::new();
        let mut failure = None;

        self.state.iterate_range(prefix, &end, true, &mut |_, v| {
            match self.codec.deserialize::<Job>(v) {
                Ok(job) => {
                    jobs.push(job);
                    ControlFlow::Continue(())
                }
                Err(e) => {
                    failure = Some(e);
                    ControlFlow::Break(())
                }
            }
        })?;

        match failure {
            Some(e) => Err(CustodyError::from(e).context("job scan failed")),
            None => Ok(jobs),
        }
    }
}

/// Smallest key greater than every key starting with `prefix`.
pub(crate) fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return end;
        }
    }
    // All 0xFF: no finite upper bound fits, use a long max key.
    vec![u8::MAX; prefix.len() + 1]
}
