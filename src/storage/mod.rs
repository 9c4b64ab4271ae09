//! Data persistence and file operations

pub mod decisions;

pub use decisions::*;
