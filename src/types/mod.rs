//! Core data types and structures

pub mod market;
pub mod contracts;
pub mod positions;
pub mod decision;
pub mod cycle;

pub use market::*;
pub use contracts::*;
pub use positions::*;
pub use decision::*;
pub use cycle::*;
