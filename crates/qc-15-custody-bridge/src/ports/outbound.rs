//! # Outbound Ports
//!
//! Capabilities the custody core depends on but does not own: the ordered
//! key/value chain state, the record codec and the off-chain job executor.

use crate::domain::{CodecError, Job, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::ControlFlow;

/// Ordered key/value store - outbound port.
///
/// Implementations may meter every call against a budget and fail once it is
/// exhausted. Reads observe writes made earlier in the same block.
pub trait ChainState: Send + Sync {
    /// Read a value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a value.
    fn set(&self, key: &[u8], value: Vec<u8>) -> Result<(), StoreError>;

    /// Check presence.
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// Delete, returning the previous value.
    fn remove(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    /// Visit `[start, end)` in key order until `visit` breaks.
    fn iterate_range(
        &self,
        start: &[u8],
        end: &[u8],
        ascending: bool,
        visit: &mut dyn FnMut(&[u8], &[u8]) -> ControlFlow<()>,
    ) -> Result<(), StoreError>;
}

/// Record with a stable type tag.
pub trait Tagged: Serialize + DeserializeOwned {
    /// Tag written next to the encoded body.
    const TAG: &'static str;
}

/// Record codec - outbound port.
pub trait Serializer: Send + Sync {
    /// Encode a tagged record.
    fn serialize<T: Tagged>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a tagged record, rejecting other tags.
    fn deserialize<T: Tagged>(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Result of one off-chain attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionResult {
    /// Action completed.
    Completed,
    /// Action failed; may be retried.
    Failed(String),
}

/// Off-chain job executor - outbound port.
///
/// Performs the foreign-chain call for a job (broadcast, confirmation count,
/// partial signature). Lives outside the deterministic path.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    /// Run one attempt of `job`.
    async fn execute(&self, job: &Job) -> ExecutionResult;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Executor that fails a fixed number of times per job kind, then succeeds.
#[derive(Default)]
pub struct MockJobExecutor {
    /// Remaining failures before success; `u32::MAX` never succeeds.
    pub failures: parking_lot::Mutex<std::collections::HashMap<String, u32>>,
    /// Jobs executed, in call order.
    pub calls: parking_lot::Mutex<Vec<String>>,
}

impl MockJobExecutor {
    /// Fail `times` attempts of every job of `tracker_name` before succeeding.
    pub fn failing(tracker_name: &str, times: u32) -> Self {
        let executor = Self::default();
        executor
            .failures
            .lock()
            .insert(tracker_name.to_lowercase(), times);
        executor
    }
}

#[async_trait]
impl JobExecutor for MockJobExecutor {
    async fn execute(&self, job: &Job) -> ExecutionResult {
        self.calls.lock().push(job.id().to_string());

        let mut failures = self.failures.lock();
        match failures.get_mut(&job.tracker_name.to_lowercase()) {
            Some(left) if *left > 0 => {
                if *left != u32::MAX {
                    *left -= 1;
                }
                ExecutionResult::Failed("mock failure".to_string())
            }
            _ => ExecutionResult::Completed,
        }
    }
}
