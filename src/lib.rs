//! Theta Engine - regime-aware position lifecycle engine for short option premium
//!
//! Classifies the market regime from a volatility index reading and the
//! benchmark trend, then decides for every held short option whether to
//! hold, close or roll it, and for every empty slot whether to open a new
//! position and with which contract. Order placement, fills and broker
//! connectivity belong to the consumer of the emitted decisions.

pub mod config;
pub mod types;
pub mod errors;
pub mod regime;
pub mod calendar;
pub mod selector;
pub mod engine;
pub mod orchestrator;
pub mod feeds;
pub mod storage;
pub mod utils;

// Re-export commonly used items
pub use config::{Config, CONFIG};
pub use errors::{EngineError, EngineResult};
pub use types::*;
