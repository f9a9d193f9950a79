//! Google Sheets upstream: credentials, access tokens and the values API.

pub mod auth;
pub mod credentials;
pub mod sheets;

use std::time::Duration;

use super::error::InfraError;

pub use auth::{AccessTokenProvider, AuthorizedClient, StaticAccessToken};
pub use credentials::{CredentialError, CredentialLoader, CredentialReport, ServiceAccountKey};
pub use sheets::GoogleSheetsClient;

/// Shared HTTP client for token exchange and Sheets calls.
pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client, InfraError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sheets-proxy/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| InfraError::http_client(format!("failed to build http client: {err}")))
}
