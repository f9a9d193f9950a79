use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::counter;

use crate::infra::http::client_ip;

use super::auth::AuthOutcome;
use super::error::ApiError;
use super::rate_limit::Endpoint;
use super::state::ApiState;

const METRIC_AUTH_REJECTED: &str = "sheets_proxy_auth_rejected_total";
const METRIC_RATE_LIMITED: &str = "sheets_proxy_rate_limited_total";

pub async fn require_bearer(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    match state.auth.verify(authorization) {
        AuthOutcome::Authorized => next.run(request).await,
        AuthOutcome::Rejected => {
            counter!(METRIC_AUTH_REJECTED, "reason" => "invalid").increment(1);
            ApiError::unauthorized().into_response()
        }
        AuthOutcome::NotConfigured => {
            counter!(METRIC_AUTH_REJECTED, "reason" => "not_configured").increment(1);
            ApiError::token_not_configured().into_response()
        }
    }
}

pub async fn rate_limit(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let endpoint = Endpoint::classify(request.uri().path());
    let ip = client_ip(&request);

    if let Err(rejection) = state.rate_limiters.check(endpoint, &ip) {
        counter!(METRIC_RATE_LIMITED, "scope" => rejection.scope.as_str()).increment(1);
        return ApiError::rate_limited(rejection).into_response();
    }

    next.run(request).await
}
