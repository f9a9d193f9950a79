//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod google;
pub mod http;
pub mod telemetry;
