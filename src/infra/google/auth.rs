//! OAuth2 access tokens for the service account (JWT bearer grant).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use metrics::counter;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::sheets::{CredentialStatus, UpstreamFailure};

use super::credentials::{CredentialError, ServiceAccountKey};

pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);
const METRIC_TOKEN_REFRESH: &str = "sheets_proxy_token_refresh_total";

/// Source of bearer tokens for upstream calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, UpstreamFailure>;

    fn credential_status(&self) -> CredentialStatus;
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct TokenErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

/// Service-account client that signs assertions and caches the resulting
/// access token until shortly before it expires.
pub struct AuthorizedClient {
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl AuthorizedClient {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Result<Self, CredentialError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
            .map_err(|err| {
                CredentialError::Invalid(format!(
                    "private_key in {} is not a valid RSA PEM key: {err}",
                    key.source
                ))
            })?;

        Ok(Self {
            client_email: key.client_email,
            token_uri: key.token_uri,
            key_id: key.private_key_id,
            encoding_key,
            http,
            cached: Mutex::new(None),
        })
    }

    /// Return the cached token, exchanging a fresh assertion when it is
    /// missing or within the refresh margin. Refreshes are serialized.
    pub async fn access_token(&self) -> Result<SecretString, UpstreamFailure> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
        {
            return Ok(token.value.clone());
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange(&self) -> Result<CachedToken, UpstreamFailure> {
        let assertion = self.sign_assertion()?;
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .http
            .post(&self.token_uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|err| UpstreamFailure::Transport(format!("token exchange failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<TokenErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error_description.or(body.error))
                .unwrap_or_else(|| status.to_string());
            let message = format!("token exchange rejected ({}): {detail}", status.as_u16());
            return Err(if status.is_client_error() {
                UpstreamFailure::Credentials(message)
            } else {
                UpstreamFailure::status(status.as_u16(), message)
            });
        }

        let token: TokenResponse = response.json().await.map_err(|err| {
            UpstreamFailure::Malformed(format!("token response could not be decoded: {err}"))
        })?;

        counter!(METRIC_TOKEN_REFRESH).increment(1);
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME);
        debug!(
            target = "sheets_proxy::google::auth",
            client_email = %self.client_email,
            expires_in_secs = lifetime.as_secs(),
            "access token refreshed"
        );

        Ok(CachedToken {
            value: SecretString::from(token.access_token),
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN),
        })
    }

    fn sign_assertion(&self) -> Result<String, UpstreamFailure> {
        let iat = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            iss: &self.client_email,
            scope: SPREADSHEETS_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        jsonwebtoken::encode(&header, &claims, &self.encoding_key).map_err(|err| {
            UpstreamFailure::Credentials(format!("failed to sign token assertion: {err}"))
        })
    }
}

/// Fixed token, for pointing the client at a local or mocked endpoint.
pub struct StaticAccessToken {
    token: SecretString,
}

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<SecretString, UpstreamFailure> {
        Ok(self.token.clone())
    }

    fn credential_status(&self) -> CredentialStatus {
        CredentialStatus {
            configured: true,
            initialized: true,
            last_error: None,
        }
    }
}
