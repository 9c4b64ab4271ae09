//! Market regime classification and signal derivation

pub mod classifier;
pub mod signals;

pub use classifier::*;
pub use signals::*;
