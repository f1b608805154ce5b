//! # Domain Module
//!
//! Core domain types for the custody bridge: the transition engine, trackers,
//! jobs and the threshold multisig.

pub mod errors;
pub mod job;
pub mod multisig;
pub mod tracker;
pub mod transition;
pub mod value_objects;

pub use errors::*;
pub use job::*;
pub use multisig::*;
pub use tracker::*;
pub use transition::*;
pub use value_objects::*;
