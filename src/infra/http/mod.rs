pub mod api;
mod middleware;
pub mod redact;

pub use api::{ApiState, build_api_router};

use std::any::Any;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit},
    http::{HeaderName, HeaderValue, Method, Request, header},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
};
use tracing::{error, warn};

use crate::config::Settings;

use api::error::ApiError;

const UNKNOWN_CLIENT: &str = "unknown";

/// Cross-cutting limits applied in front of every route.
#[derive(Debug, Clone)]
pub struct EdgeConfig {
    pub allow_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

impl EdgeConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            allow_origins: settings.cors.allow_origins.clone(),
            max_body_bytes: settings.server.max_body_bytes.get(),
            request_timeout: settings.server.request_timeout,
        }
    }
}

/// Peer address recorded by `into_make_service_with_connect_info`.
pub fn client_ip(request: &Request<Body>) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

pub fn build_router(state: ApiState, edge: &EdgeConfig) -> Router {
    build_api_router(state)
        .layer(DefaultBodyLimit::max(edge.max_body_bytes))
        .layer(axum_middleware::from_fn_with_state(
            edge.request_timeout,
            middleware::request_timeout,
        ))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(build_cors_layer(&edge.allow_origins))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

fn build_cors_layer(allow_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(
                    target = "sheets_proxy::http::cors",
                    origin = %origin,
                    error = %err,
                    "ignoring invalid CORS origin"
                );
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([HeaderName::from_static("retry-after")])
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "handler panicked".to_string()
    };

    error!(
        target = "sheets_proxy::http::panic",
        detail = %detail,
        "request handler panicked"
    );
    ApiError::internal("infra::http::panic", format!("panic: {detail}")).into_response()
}
