//! In-process response cache for spreadsheet reads.
//!
//! Entries are keyed by `(operation, spreadsheet id, range)` and expire after
//! a fixed TTL. Expiry is checked lazily on lookup and swept periodically by
//! the server's maintenance task.
//!
//! ```toml
//! [cache]
//! ttl_seconds = 30
//! sweep_interval_seconds = 60
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::ResponseCache;

pub(crate) use lock::{rw_read, rw_write};
