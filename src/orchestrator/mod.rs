//! Cycle orchestration and the adapter seams it runs against

pub mod interfaces;
pub mod retry;
pub mod cycle;

pub use interfaces::*;
pub use retry::*;
pub use cycle::*;
