use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter,
    filter::Directive,
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Dependency targets held at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: &[&str] = &["hyper_util", "reqwest", "rustls", "h2"];

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        for target in QUIET_TARGETS {
            let directive: Directive = format!("{target}=warn").parse().map_err(|err| {
                InfraError::telemetry(format!("invalid log directive for {target}: {err}"))
            })?;
            env_filter = env_filter.add_directive(directive);
        }
    }

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the proxy emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sheets_proxy_cache_hit_total",
            Unit::Count,
            "Total number of read cache hits."
        );
        describe_counter!(
            "sheets_proxy_cache_miss_total",
            Unit::Count,
            "Total number of read cache misses, including expired entries."
        );
        describe_counter!(
            "sheets_proxy_cache_expired_total",
            Unit::Count,
            "Total number of cache entries removed after their TTL elapsed."
        );
        describe_counter!(
            "sheets_proxy_dedupe_joined_total",
            Unit::Count,
            "Total number of reads that joined an in-flight upstream fetch."
        );
        describe_counter!(
            "sheets_proxy_upstream_requests_total",
            Unit::Count,
            "Total number of upstream spreadsheet calls by operation and result."
        );
        describe_counter!(
            "sheets_proxy_token_refresh_total",
            Unit::Count,
            "Total number of OAuth access token exchanges."
        );
        describe_counter!(
            "sheets_proxy_rate_limited_total",
            Unit::Count,
            "Total number of requests rejected by a rate limit scope."
        );
        describe_counter!(
            "sheets_proxy_auth_rejected_total",
            Unit::Count,
            "Total number of requests rejected by bearer authentication."
        );
    });
}
