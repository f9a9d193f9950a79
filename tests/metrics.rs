use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use metrics_util::debugging::DebuggingRecorder;
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

use sheets_proxy::application::gateway::SheetsGateway;
use sheets_proxy::application::sheets::{CredentialStatus, SheetsUpstream, UpstreamFailure};
use sheets_proxy::cache::{CacheConfig, CacheKey, ResponseCache};
use sheets_proxy::domain::access::SheetTarget;
use sheets_proxy::infra::http::api::auth::BearerAuth;
use sheets_proxy::infra::http::api::rate_limit::{FixedWindowLimiter, RateLimiters};
use sheets_proxy::infra::http::{ApiState, EdgeConfig, build_router};
use sheets_proxy_types::{AppendUpdates, Rows};

struct SlowSheets;

#[async_trait]
impl SheetsUpstream for SlowSheets {
    async fn get_values(&self, _target: &SheetTarget) -> Result<Rows, UpstreamFailure> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(vec![vec![json!("v")]])
    }

    async fn append_values(
        &self,
        _target: &SheetTarget,
        _rows: &Rows,
    ) -> Result<AppendUpdates, UpstreamFailure> {
        Ok(AppendUpdates::default())
    }

    fn credential_status(&self) -> CredentialStatus {
        CredentialStatus::default()
    }
}

#[tokio::test]
async fn proxy_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Cache hit, miss and lazy expiry
    let cache = ResponseCache::new(CacheConfig::default());
    let target = SheetTarget::new("S1", "A1:B2").expect("valid target");
    let key = CacheKey::read(&target);
    assert!(cache.get(&key).is_none());
    cache.set_with_ttl(key.clone(), Arc::new(vec![]), Duration::from_millis(10));
    assert!(cache.get(&key).is_some());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(cache.get(&key).is_none());

    // Deduplicated upstream read
    let gateway = Arc::new(SheetsGateway::new(
        Arc::new(SlowSheets),
        Arc::new(ResponseCache::new(CacheConfig::default())),
        Duration::from_secs(5),
    ));
    let (first, second) = tokio::join!(gateway.read(&target), gateway.read(&target));
    assert!(first.is_ok() && second.is_ok());

    // Auth rejection and rate limiting through the router
    let window = Duration::from_secs(60);
    let state = ApiState::new(
        gateway,
        BearerAuth::new(Some(&SecretString::from("secret".to_string()))),
        RateLimiters::new(
            FixedWindowLimiter::new(window, 100),
            FixedWindowLimiter::new(window, 1),
            FixedWindowLimiter::new(window, 100),
        ),
    );
    let router = build_router(
        state,
        &EdgeConfig {
            allow_origins: Vec::new(),
            max_body_bytes: 1024,
            request_timeout: Duration::from_secs(5),
        },
    );

    let mut statuses = Vec::new();
    for token in ["wrong", "secret", "secret"] {
        let request = Request::builder()
            .method(Method::GET)
            .uri("/api/sheets/status")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("request should build");
        let response = router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        statuses.push(response.status());
    }
    assert_eq!(
        statuses,
        vec![
            StatusCode::UNAUTHORIZED,
            StatusCode::OK,
            StatusCode::TOO_MANY_REQUESTS
        ]
    );

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "sheets_proxy_cache_hit_total",
        "sheets_proxy_cache_miss_total",
        "sheets_proxy_cache_expired_total",
        "sheets_proxy_dedupe_joined_total",
        "sheets_proxy_upstream_requests_total",
        "sheets_proxy_auth_rejected_total",
        "sheets_proxy_rate_limited_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
