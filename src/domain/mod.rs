//! Domain layer types and invariants.

pub mod access;
pub mod error;
