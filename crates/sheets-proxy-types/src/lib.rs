//! Wire types shared by the sheets-proxy server and its clients.
//!
//! Field names follow the JSON contract consumed by the browser forms
//! (`spreadsheetId`, `authInitialized`, ...), so every struct renames to
//! camelCase.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A block of cell values as returned by a range read.
pub type Rows = Vec<Vec<Value>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClearCacheRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponse {
    pub ok: bool,
    pub cached: bool,
    pub values: Rows,
}

/// Summary of an append as reported by the upstream API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendUpdates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spreadsheet_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_rows: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_columns: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_cells: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendResponse {
    pub ok: bool,
    pub updates: AppendUpdates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub ok: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConfigured {
    pub sheets: bool,
    pub auth_token: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthPerf {
    pub ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// RFC 3339 timestamp of the response.
    pub time: String,
    pub configured: HealthConfigured,
    /// Process uptime in seconds.
    pub uptime: f64,
    pub perf: HealthPerf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub ok: bool,
    pub stats: CacheCounters,
    /// A bounded sample of live cache keys.
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheResponse {
    pub ok: bool,
    pub cleared: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub ok: bool,
    pub configured: bool,
    pub auth_initialized: bool,
    pub last_auth_error: Option<String>,
    pub cache: CacheCounters,
    pub queue_size: usize,
}
