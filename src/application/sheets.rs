//! Port to the upstream spreadsheet API.

use async_trait::async_trait;
use sheets_proxy_types::{AppendUpdates, Rows};
use thiserror::Error;

use crate::domain::access::SheetTarget;

/// Failures reported by an upstream adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// No usable service credential, or the token exchange was refused.
    #[error("credentials unavailable: {0}")]
    Credentials(String),
    /// The API answered with a non-success status.
    #[error("upstream responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("upstream request failed: {0}")]
    Transport(String),
    #[error("upstream response could not be decoded: {0}")]
    Malformed(String),
}

impl UpstreamFailure {
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }
}

/// Credential state surfaced on the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStatus {
    /// A credential source (file or inline JSON) is configured.
    pub configured: bool,
    /// An authorized client has been built successfully.
    pub initialized: bool,
    pub last_error: Option<String>,
}

#[async_trait]
pub trait SheetsUpstream: Send + Sync {
    async fn get_values(&self, target: &SheetTarget) -> Result<Rows, UpstreamFailure>;

    async fn append_values(
        &self,
        target: &SheetTarget,
        rows: &Rows,
    ) -> Result<AppendUpdates, UpstreamFailure>;

    fn credential_status(&self) -> CredentialStatus;
}
