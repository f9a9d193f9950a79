//! Cache configuration.

use std::time::Duration;

const DEFAULT_TTL: Duration = Duration::from_secs(30);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_STATS_KEY_SAMPLE: usize = 10;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime of every read entry.
    pub ttl: Duration,
    /// How often expired entries are purged in the background.
    pub sweep_interval: Duration,
    /// Number of keys reported by the stats endpoint.
    pub stats_key_sample: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stats_key_sample: DEFAULT_STATS_KEY_SAMPLE,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: settings.ttl,
            sweep_interval: settings.sweep_interval,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.stats_key_sample, 10);
    }
}
