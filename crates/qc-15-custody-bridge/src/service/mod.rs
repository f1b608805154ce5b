//! # Service Layer
//!
//! The deterministic custody service and the validator-local job runner.

mod custody_service;
mod job_runner;

pub use custody_service::CustodyService;
pub use job_runner::{JobOutcome, JobRunner, JobStatus};
