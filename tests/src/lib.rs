//! # Quantum-Chain Custody Bridge Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # End-to-end custody flows
//!     ├── fixtures.rs   # Simulated validator network
//!     └── custody_flow.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qc-tests
//!
//! # By category
//! cargo test -p qc-tests integration::
//! ```

#![allow(dead_code)]

pub mod integration;
