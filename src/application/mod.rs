//! Application services: read/append orchestration and operator helpers.

pub mod dedupe;
pub mod error;
pub mod gateway;
pub mod sheets;
pub mod tokens;
