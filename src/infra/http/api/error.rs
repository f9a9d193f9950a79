use axum::Json;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sheets_proxy_types::ErrorResponse;

use crate::application::error::ErrorReport;
use crate::application::gateway::GatewayError;
use crate::domain::error::DomainError;

use super::rate_limit::Rejection;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const SHEETS_NOT_CONFIGURED: &str = "Google Sheets integration not configured";
const TOKEN_NOT_CONFIGURED: &str = "Proxy not fully configured (API_TOKEN missing)";

/// The single renderer of `{ ok: false, error }` bodies.
///
/// `detail` is what operators see in logs; callers get `message`, which for
/// 5xx answers is always generic.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    source: &'static str,
    message: String,
    detail: String,
    retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        source: &'static str,
        message: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            message.into()
        };
        Self {
            status,
            source,
            message,
            detail: detail.into(),
            retry_after: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            StatusCode::BAD_REQUEST,
            "infra::http::api::validation",
            message.clone(),
            message,
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "infra::http::api::auth",
            "Unauthorized",
            "missing or invalid bearer token",
        )
    }

    pub fn token_not_configured() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "infra::http::api::auth",
            TOKEN_NOT_CONFIGURED,
            "no API token configured",
        )
    }

    pub fn rate_limited(rejection: Rejection) -> Self {
        let retry_after = rejection.retry_after_secs();
        let mut error = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            "infra::http::api::rate_limit",
            rejection.scope.rejection_message(),
            format!("rate_limited: scope={} retry_after={retry_after}", rejection.scope),
        );
        error.retry_after = Some(retry_after);
        error
    }

    pub fn route_not_found(path: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "infra::http::fallback",
            "Not Found",
            format!("no route for {path}"),
        )
    }

    pub fn timeout(limit_secs: u64) -> Self {
        Self::new(
            StatusCode::REQUEST_TIMEOUT,
            "infra::http::timeout",
            "Request timeout",
            format!("request exceeded {limit_secs}s"),
        )
    }

    pub fn internal(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            source,
            INTERNAL_ERROR_MESSAGE,
            detail,
        )
    }
}

impl From<GatewayError> for ApiError {
    fn from(error: GatewayError) -> Self {
        const SOURCE: &str = "application::gateway";
        match error {
            GatewayError::Configuration(detail) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                SOURCE,
                SHEETS_NOT_CONFIGURED,
                detail,
            ),
            GatewayError::NotFound(message) => {
                Self::new(StatusCode::NOT_FOUND, SOURCE, message.clone(), message)
            }
            GatewayError::Forbidden(message) => {
                Self::new(StatusCode::FORBIDDEN, SOURCE, message.clone(), message)
            }
            GatewayError::Upstream(detail) => Self::internal(SOURCE, detail),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self::validation(error.to_string())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        let status = rejection.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::new(
                status,
                "infra::http::api::body",
                "Request body too large",
                rejection.body_text(),
            )
        } else {
            Self::new(
                StatusCode::BAD_REQUEST,
                "infra::http::api::body",
                "Invalid request body",
                rejection.body_text(),
            )
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(ErrorResponse::new(self.message))).into_response();
        if let Some(retry_after) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        ErrorReport::from_message(self.source, self.status, self.detail).attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infra::http::api::rate_limit::Scope;

    #[test]
    fn upstream_failures_hide_detail() {
        let error = ApiError::from(GatewayError::Upstream("quota exceeded for key abc".into()));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error.message, INTERNAL_ERROR_MESSAGE);
        assert!(error.detail.contains("quota exceeded"));
    }

    #[test]
    fn client_errors_keep_upstream_message() {
        let error = ApiError::from(GatewayError::NotFound("Requested entity was not found.".into()));
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
        assert_eq!(error.message, "Requested entity was not found.");
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(Rejection {
            scope: Scope::Sheets,
            retry_after: Duration::from_secs(12),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER),
            Some(&HeaderValue::from_static("12"))
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
