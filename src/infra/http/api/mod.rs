pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod rate_limit;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

/// `/api/*` routes. Sheets routes authenticate before they are charged
/// against any rate-limit scope; route layers run outermost-last.
pub fn build_api_router(state: ApiState) -> Router {
    let sheets = Router::new()
        .route("/api/sheets/read", post(handlers::read))
        .route("/api/sheets/append", post(handlers::append))
        .route("/api/sheets/cache/stats", get(handlers::cache_stats))
        .route("/api/sheets/cache/clear", post(handlers::cache_clear))
        .route("/api/sheets/status", get(handlers::status))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_bearer,
        ));

    let health = Router::new()
        .route("/api/health", get(handlers::health))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    let fallback: Router = Router::new()
        .fallback(handlers::not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit,
        ));

    sheets
        .merge(health)
        .with_state(state)
        .fallback_service(fallback)
}
