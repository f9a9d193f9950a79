use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use secrecy::SecretString;
use serde_json::json;
use url::Url;

use sheets_proxy::application::gateway::{GatewayError, SheetsGateway};
use sheets_proxy::application::sheets::{SheetsUpstream, UpstreamFailure};
use sheets_proxy::cache::{CacheConfig, ResponseCache};
use sheets_proxy::config::GoogleSettings;
use sheets_proxy::domain::access::{AppendCommand, SheetTarget};
use sheets_proxy::infra::google::{
    AccessTokenProvider, CredentialLoader, GoogleSheetsClient, StaticAccessToken,
    build_http_client,
};

const TEST_KEY_PEM: &str = include_str!("fixtures/service_account_key.pem");
const ACCESS_TOKEN: &str = "ya29.test-access-token";

fn base_url(server: &MockServer) -> Url {
    Url::parse(&server.url("/v4/")).expect("mock base url")
}

fn static_client(server: &MockServer) -> GoogleSheetsClient {
    let http = build_http_client(Duration::from_secs(5)).expect("http client");
    GoogleSheetsClient::new(
        http,
        base_url(server),
        Arc::new(StaticAccessToken::new(ACCESS_TOKEN)),
    )
}

fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "project_id": "demo",
        "private_key_id": "key-1",
        "private_key": TEST_KEY_PEM,
        "client_email": "proxy@demo.iam.gserviceaccount.com",
        "token_uri": token_uri
    })
    .to_string()
}

fn target() -> SheetTarget {
    SheetTarget::new("S1", "Sheet1!A1:B2").expect("valid target")
}

#[tokio::test]
async fn get_values_returns_rows() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/v4/spreadsheets/S1/values/Sheet1!A1:B2")
                .header("authorization", format!("Bearer {ACCESS_TOKEN}"));
            then.status(200).json_body(json!({
                "range": "Sheet1!A1:B2",
                "majorDimension": "ROWS",
                "values": [["Date", "Units"], ["2024-03-01", "120"]]
            }));
        })
        .await;

    let rows = static_client(&server)
        .get_values(&target())
        .await
        .expect("values");

    assert_eq!(
        rows,
        vec![
            vec![json!("Date"), json!("Units")],
            vec![json!("2024-03-01"), json!("120")]
        ]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn missing_values_field_means_empty_range() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v4/spreadsheets/S1/values/Sheet1!A1:B2");
            then.status(200)
                .json_body(json!({ "range": "Sheet1!A1:B2", "majorDimension": "ROWS" }));
        })
        .await;

    let rows = static_client(&server)
        .get_values(&target())
        .await
        .expect("values");
    assert!(rows.is_empty());
}

#[tokio::test]
async fn append_posts_raw_values() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v4/spreadsheets/S1/values/Sheet1!A1:B2:append")
                .query_param("valueInputOption", "RAW")
                .json_body(json!({ "values": [["2024-03-01", 120]] }));
            then.status(200).json_body(json!({
                "spreadsheetId": "S1",
                "updates": {
                    "spreadsheetId": "S1",
                    "updatedRange": "Sheet1!A3:B3",
                    "updatedRows": 1,
                    "updatedColumns": 2,
                    "updatedCells": 2
                }
            }));
        })
        .await;

    let updates = static_client(&server)
        .append_values(&target(), &vec![vec![json!("2024-03-01"), json!(120)]])
        .await
        .expect("append");

    assert_eq!(updates.updated_range.as_deref(), Some("Sheet1!A3:B3"));
    assert_eq!(updates.updated_rows, Some(1));
    assert_eq!(updates.updated_cells, Some(2));
    mock.assert_async().await;
}

#[tokio::test]
async fn not_found_maps_through_the_gateway() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/v4/spreadsheets/S1/values/Sheet1!A1:B2");
            then.status(404).json_body(json!({
                "error": {
                    "code": 404,
                    "message": "Requested entity was not found.",
                    "status": "NOT_FOUND"
                }
            }));
        })
        .await;

    let gateway = SheetsGateway::new(
        Arc::new(static_client(&server)),
        Arc::new(ResponseCache::new(CacheConfig::default())),
        Duration::from_secs(5),
    );
    let error = gateway.read(&target()).await.expect_err("404 should fail");

    assert_eq!(
        error,
        GatewayError::NotFound("Requested entity was not found.".to_string())
    );
    assert_eq!(gateway.cache_stats().size, 0);
}

#[tokio::test]
async fn service_account_token_is_exchanged_once_and_reused() {
    let server = MockServer::start_async().await;
    let token_mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/token")
                .header("content-type", "application/x-www-form-urlencoded")
                .body_includes("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer")
                .body_includes("assertion=");
            then.status(200).json_body(json!({
                "access_token": ACCESS_TOKEN,
                "expires_in": 3600,
                "token_type": "Bearer"
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/v4/spreadsheets/S1/values/Sheet1!A1:B2:append")
                .header("authorization", format!("Bearer {ACCESS_TOKEN}"));
            then.status(200)
                .json_body(json!({ "updates": { "updatedRows": 1 } }));
        })
        .await;

    let http = build_http_client(Duration::from_secs(5)).expect("http client");
    let settings = GoogleSettings {
        service_account_file: None,
        inline_json: vec![SecretString::from(service_account_json(
            &server.url("/token"),
        ))],
    };
    let tokens: Arc<dyn AccessTokenProvider> = Arc::new(CredentialLoader::new(settings, http.clone()));
    let client = Arc::new(GoogleSheetsClient::new(http, base_url(&server), tokens));
    let gateway = SheetsGateway::new(
        client,
        Arc::new(ResponseCache::new(CacheConfig::default())),
        Duration::from_secs(5),
    );

    let command = AppendCommand::from_body(&json!({
        "spreadsheetId": "S1",
        "range": "Sheet1!A1:B2",
        "values": [["a"]]
    }))
    .expect("valid command");
    gateway.append(&command).await.expect("first append");
    gateway.append(&command).await.expect("second append");

    token_mock.assert_async().await;
    let status = gateway.status().credentials;
    assert!(status.configured);
    assert!(status.initialized);
    assert_eq!(status.last_error, None);
}

#[tokio::test]
async fn rejected_token_exchange_is_a_credentials_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/token");
            then.status(400).json_body(json!({
                "error": "invalid_grant",
                "error_description": "Invalid JWT Signature."
            }));
        })
        .await;

    let http = build_http_client(Duration::from_secs(5)).expect("http client");
    let settings = GoogleSettings {
        service_account_file: None,
        inline_json: vec![SecretString::from(service_account_json(
            &server.url("/token"),
        ))],
    };
    let client = GoogleSheetsClient::new(
        http.clone(),
        base_url(&server),
        Arc::new(CredentialLoader::new(settings, http)),
    );

    let failure = client
        .get_values(&target())
        .await
        .expect_err("token exchange should fail");
    assert!(
        matches!(&failure, UpstreamFailure::Credentials(message) if message.contains("Invalid JWT Signature.")),
        "unexpected failure: {failure:?}"
    );
}

#[tokio::test]
async fn missing_credentials_surface_as_configuration_errors() {
    let server = MockServer::start_async().await;
    let http = build_http_client(Duration::from_secs(5)).expect("http client");
    let tokens: Arc<dyn AccessTokenProvider> =
        Arc::new(CredentialLoader::new(GoogleSettings::default(), http.clone()));
    let gateway = SheetsGateway::new(
        Arc::new(GoogleSheetsClient::new(http, base_url(&server), tokens)),
        Arc::new(ResponseCache::new(CacheConfig::default())),
        Duration::from_secs(5),
    );

    let error = gateway.read(&target()).await.expect_err("no credentials");
    assert!(matches!(error, GatewayError::Configuration(_)));

    let status = gateway.status().credentials;
    assert!(!status.configured);
    assert!(!status.initialized);
    assert_eq!(
        status.last_error.as_deref(),
        Some("No Google service account credentials found")
    );
}
