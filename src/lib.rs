//! Authenticated, rate-limited and cached HTTP proxy in front of the
//! Google Sheets `spreadsheets.values` API.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
