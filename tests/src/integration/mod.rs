//! # Integration Tests
//!
//! End-to-end custody flows across a simulated validator network.

pub mod custody_flow;
pub mod fixtures;
