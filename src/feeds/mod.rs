//! Concrete adapters behind the engine's input seams

pub mod snapshot;

pub use snapshot::*;
