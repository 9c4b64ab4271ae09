//! Earnings calendar helpers

pub mod earnings;
pub mod cache;

pub use earnings::*;
pub use cache::*;
