//! Candidate contract selection

pub mod chain;

pub use chain::*;
