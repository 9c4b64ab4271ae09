//! Position lifecycle decisions

pub mod policy;
pub mod decision;

pub use policy::*;
pub use decision::*;
