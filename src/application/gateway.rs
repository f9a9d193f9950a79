//! Read/append orchestration in front of the upstream spreadsheet API.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use metrics::counter;
use sheets_proxy_types::{AppendUpdates, CacheCounters, Rows};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    cache::{CacheKey, ResponseCache},
    domain::access::{AppendCommand, Operation, SheetTarget},
};

use super::{
    dedupe::{Abandoned, RequestDeduplicator},
    sheets::{CredentialStatus, SheetsUpstream, UpstreamFailure},
};

const METRIC_UPSTREAM_REQUESTS: &str = "sheets_proxy_upstream_requests_total";

/// Closed error taxonomy of the gateway. Messages are kept verbatim for logs;
/// the HTTP edge decides what callers see.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Upstream(String),
}

impl From<UpstreamFailure> for GatewayError {
    fn from(failure: UpstreamFailure) -> Self {
        match failure {
            UpstreamFailure::Credentials(message) => Self::Configuration(message),
            UpstreamFailure::Status {
                status: 404,
                message,
            } => Self::NotFound(message),
            UpstreamFailure::Status {
                status: 403,
                message,
            } => Self::Forbidden(message),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<Abandoned> for GatewayError {
    fn from(error: Abandoned) -> Self {
        Self::Upstream(error.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub values: Arc<Rows>,
    pub cached: bool,
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone)]
pub struct GatewayStatus {
    pub credentials: CredentialStatus,
    pub cache: CacheCounters,
    pub queue_size: usize,
}

/// Reads are deduplicated per key and write generation. A fetch that began
/// before an append to the same key is neither cached nor joined afterwards.
#[derive(Clone)]
pub struct SheetsGateway {
    upstream: Arc<dyn SheetsUpstream>,
    cache: Arc<ResponseCache>,
    reads: RequestDeduplicator<(CacheKey, u64), Arc<Rows>, GatewayError>,
    generations: Arc<DashMap<CacheKey, u64>>,
    upstream_timeout: Duration,
}

impl SheetsGateway {
    pub fn new(
        upstream: Arc<dyn SheetsUpstream>,
        cache: Arc<ResponseCache>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            upstream,
            cache,
            reads: RequestDeduplicator::new(),
            generations: Arc::new(DashMap::new()),
            upstream_timeout,
        }
    }

    /// Serve `target` from cache, or fetch it once for all concurrent callers
    /// and populate the cache before returning.
    pub async fn read(&self, target: &SheetTarget) -> Result<ReadOutcome, GatewayError> {
        let key = CacheKey::read(target);
        if let Some(values) = self.cache.get(&key) {
            debug!(
                target = "sheets_proxy::application::gateway",
                cache_key = %key,
                "cache hit"
            );
            return Ok(ReadOutcome {
                values,
                cached: true,
            });
        }

        let generation = generation_of(&self.generations, &key);
        let upstream = Arc::clone(&self.upstream);
        let cache = Arc::clone(&self.cache);
        let generations = Arc::clone(&self.generations);
        let timeout = self.upstream_timeout;
        let fetch_target = target.clone();
        let fetch_key = key.clone();

        let values = self
            .reads
            .run_exclusive((key, generation), move || async move {
                let started = Instant::now();
                let outcome = bounded(timeout, upstream.get_values(&fetch_target)).await;
                record_upstream(Operation::Read, &outcome);

                match outcome {
                    Ok(rows) => {
                        let rows = Arc::new(rows);
                        if generation_of(&generations, &fetch_key) == generation {
                            cache.set(fetch_key.clone(), Arc::clone(&rows));
                        } else {
                            debug!(
                                target = "sheets_proxy::application::gateway",
                                cache_key = %fetch_key,
                                "append landed during fetch; result not cached"
                            );
                        }
                        info!(
                            target = "sheets_proxy::application::gateway",
                            cache_key = %fetch_key,
                            rows = rows.len(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "read fetched from upstream"
                        );
                        Ok(rows)
                    }
                    Err(error) => {
                        warn!(
                            target = "sheets_proxy::application::gateway",
                            cache_key = %fetch_key,
                            error = %error,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "read failed"
                        );
                        Err(error)
                    }
                }
            })
            .await?;

        Ok(ReadOutcome {
            values,
            cached: false,
        })
    }

    /// Append rows and drop the cached read of the identical range.
    ///
    /// Appends are never deduplicated or retried; a failed append leaves the
    /// cache untouched.
    pub async fn append(&self, command: &AppendCommand) -> Result<AppendUpdates, GatewayError> {
        let started = Instant::now();
        let outcome = bounded(
            self.upstream_timeout,
            self.upstream.append_values(&command.target, &command.rows),
        )
        .await;
        record_upstream(Operation::Append, &outcome);

        let key = CacheKey::read(&command.target);
        match outcome {
            Ok(updates) => {
                *self.generations.entry(key.clone()).or_insert(0) += 1;
                let invalidated = self.cache.invalidate(&key);
                info!(
                    target = "sheets_proxy::application::gateway",
                    cache_key = %key,
                    rows = command.rows.len(),
                    updated_rows = updates.updated_rows.unwrap_or(0),
                    invalidated,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "append succeeded"
                );
                Ok(updates)
            }
            Err(error) => {
                warn!(
                    target = "sheets_proxy::application::gateway",
                    cache_key = %key,
                    error = %error,
                    "append failed"
                );
                Err(error)
            }
        }
    }

    pub fn cache_stats(&self) -> CacheCounters {
        self.cache.stats()
    }

    pub fn cache_keys(&self) -> Vec<String> {
        self.cache.keys(self.cache.config().stats_key_sample)
    }

    /// Clear all entries, or only those whose key contains `pattern`.
    pub fn clear_cache(&self, pattern: Option<&str>) -> usize {
        let cleared = match pattern {
            Some(pattern) => self.cache.clear_matching(pattern),
            None => self.cache.clear(),
        };
        info!(
            target = "sheets_proxy::application::gateway",
            cleared,
            pattern = pattern.unwrap_or("*"),
            "cache cleared"
        );
        cleared
    }

    pub fn in_flight(&self) -> usize {
        self.reads.in_flight()
    }

    pub fn status(&self) -> GatewayStatus {
        GatewayStatus {
            credentials: self.upstream.credential_status(),
            cache: self.cache.stats(),
            queue_size: self.in_flight(),
        }
    }
}

fn generation_of(generations: &DashMap<CacheKey, u64>, key: &CacheKey) -> u64 {
    generations.get(key).map_or(0, |entry| *entry)
}

async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, UpstreamFailure>>,
) -> Result<T, GatewayError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(GatewayError::from),
        Err(_) => Err(GatewayError::Upstream(format!(
            "upstream request timed out after {}s",
            timeout.as_secs_f64()
        ))),
    }
}

fn record_upstream<T>(operation: Operation, outcome: &Result<T, GatewayError>) {
    let result = match outcome {
        Ok(_) => "ok",
        Err(GatewayError::Configuration(_)) => "configuration",
        Err(GatewayError::NotFound(_)) => "not_found",
        Err(GatewayError::Forbidden(_)) => "forbidden",
        Err(GatewayError::Upstream(_)) => "upstream",
    };
    counter!(METRIC_UPSTREAM_REQUESTS, "operation" => operation.as_str(), "result" => result).increment(1);
}
