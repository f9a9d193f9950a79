use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::extract::rejection::BytesRejection;
use serde_json::Value;
use sheets_proxy_types::{
    AppendResponse, CacheStatsResponse, ClearCacheRequest, ClearCacheResponse, HealthConfigured,
    HealthPerf, HealthResponse, ReadResponse, StatusResponse,
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::domain::access::{AppendCommand, SheetTarget};

use super::error::ApiError;
use super::state::ApiState;

const SERVICE_NAME: &str = "sheets-proxy";

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn health(State(state): State<ApiState>) -> ApiResult<HealthResponse> {
    let started = Instant::now();
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|err| ApiError::internal("infra::http::api::health", err.to_string()))?;
    let sheets_configured = state.gateway.status().credentials.configured;

    Ok(Json(HealthResponse {
        ok: true,
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        time,
        configured: HealthConfigured {
            sheets: sheets_configured,
            auth_token: state.auth.is_configured(),
        },
        uptime: state.started_at.elapsed().as_secs_f64(),
        perf: HealthPerf {
            ms: started.elapsed().as_millis() as u64,
        },
    }))
}

pub async fn read(
    State(state): State<ApiState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<ReadResponse> {
    let body = parse_body(body)?;
    let target = SheetTarget::from_body(&body)?;

    let outcome = state.gateway.read(&target).await?;
    Ok(Json(ReadResponse {
        ok: true,
        cached: outcome.cached,
        values: outcome.values.as_ref().clone(),
    }))
}

pub async fn append(
    State(state): State<ApiState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<AppendResponse> {
    let body = parse_body(body)?;
    let command = AppendCommand::from_body(&body)?;

    let updates = state.gateway.append(&command).await?;
    Ok(Json(AppendResponse { ok: true, updates }))
}

pub async fn cache_stats(State(state): State<ApiState>) -> Json<CacheStatsResponse> {
    Json(CacheStatsResponse {
        ok: true,
        stats: state.gateway.cache_stats(),
        keys: state.gateway.cache_keys(),
    })
}

pub async fn cache_clear(
    State(state): State<ApiState>,
    body: Result<Bytes, BytesRejection>,
) -> ApiResult<ClearCacheResponse> {
    let body = body?;
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ClearCacheRequest::default()
    } else {
        serde_json::from_slice::<ClearCacheRequest>(&body)
            .map_err(|err| invalid_json(&err))?
    };
    let pattern = request.pattern.filter(|pattern| !pattern.is_empty());

    let cleared = state.gateway.clear_cache(pattern.as_deref());
    Ok(Json(ClearCacheResponse {
        ok: true,
        cleared,
        pattern,
    }))
}

pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let status = state.gateway.status();
    Json(StatusResponse {
        ok: true,
        configured: status.credentials.configured,
        auth_initialized: status.credentials.initialized,
        last_auth_error: status.credentials.last_error,
        cache: status.cache,
        queue_size: status.queue_size,
    })
}

pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

fn parse_body(body: Result<Bytes, BytesRejection>) -> Result<Value, ApiError> {
    let body = body?;
    serde_json::from_slice(&body).map_err(|err| invalid_json(&err))
}

fn invalid_json(err: &serde_json::Error) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        "infra::http::api::body",
        "Invalid JSON body",
        err.to_string(),
    )
}
