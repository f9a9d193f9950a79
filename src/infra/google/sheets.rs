//! `spreadsheets.values` adapter for the Sheets v4 REST API.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sheets_proxy_types::{AppendUpdates, Rows};
use url::Url;

use crate::{
    application::sheets::{CredentialStatus, SheetsUpstream, UpstreamFailure},
    domain::access::SheetTarget,
};

use super::auth::AccessTokenProvider;

const VALUE_INPUT_OPTION: &str = "RAW";

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Option<Rows>,
}

#[derive(Serialize)]
struct AppendBody<'a> {
    values: &'a Rows,
}

#[derive(Deserialize)]
struct AppendValuesResponse {
    #[serde(default)]
    updates: Option<AppendUpdates>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl GoogleSheetsClient {
    /// `base_url` must end with a slash, e.g. `https://sheets.googleapis.com/v4/`.
    pub fn new(http: reqwest::Client, base_url: Url, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            http,
            base_url,
            tokens,
        }
    }

    fn values_url(&self, target: &SheetTarget, suffix: &str) -> Result<Url, UpstreamFailure> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamFailure::Transport("upstream base url cannot be a base".into()))?
            .pop_if_empty()
            .extend([
                "spreadsheets",
                target.spreadsheet_id(),
                "values",
                &format!("{}{suffix}", target.range()),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl SheetsUpstream for GoogleSheetsClient {
    async fn get_values(&self, target: &SheetTarget) -> Result<Rows, UpstreamFailure> {
        let url = self.values_url(target, "")?;
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(transport)?;
        let response = ensure_success(response).await?;

        let body: ValueRange = response.json().await.map_err(malformed)?;
        Ok(body.values.unwrap_or_default())
    }

    async fn append_values(
        &self,
        target: &SheetTarget,
        rows: &Rows,
    ) -> Result<AppendUpdates, UpstreamFailure> {
        let mut url = self.values_url(target, ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", VALUE_INPUT_OPTION);
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(&AppendBody { values: rows })
            .send()
            .await
            .map_err(transport)?;
        let response = ensure_success(response).await?;

        let body: AppendValuesResponse = response.json().await.map_err(malformed)?;
        Ok(body.updates.unwrap_or_default())
    }

    fn credential_status(&self) -> CredentialStatus {
        self.tokens.credential_status()
    }
}

async fn ensure_success(response: Response) -> Result<Response, UpstreamFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    Err(UpstreamFailure::status(
        status.as_u16(),
        error_message(status, &text),
    ))
}

fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<GoogleErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message.or(envelope.error.status))
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("upstream request failed")
                .to_string()
        })
}

fn transport(err: reqwest::Error) -> UpstreamFailure {
    UpstreamFailure::Transport(err.to_string())
}

fn malformed(err: reqwest::Error) -> UpstreamFailure {
    UpstreamFailure::Malformed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::google::auth::StaticAccessToken;

    fn client(base: &str) -> GoogleSheetsClient {
        GoogleSheetsClient::new(
            reqwest::Client::new(),
            Url::parse(base).expect("valid url"),
            Arc::new(StaticAccessToken::new("t")),
        )
    }

    #[test]
    fn values_url_encodes_range_as_one_segment() {
        let target = SheetTarget::new("S1", "Daily Log!A1:C3").expect("valid target");
        let url = client("https://sheets.googleapis.com/v4/")
            .values_url(&target, ":append")
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/S1/values/Daily%20Log!A1:C3:append"
        );
    }

    #[test]
    fn slash_in_range_does_not_split_path() {
        let target = SheetTarget::new("S1", "a/b!A1").expect("valid target");
        let url = client("http://127.0.0.1:1/v4/")
            .values_url(&target, "")
            .expect("url");
        assert!(url.path().ends_with("/values/a%2Fb!A1"));
    }

    #[test]
    fn error_message_prefers_google_message() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND"}}"#;
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, body),
            "Requested entity was not found."
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "<html>"),
            "Bad Gateway"
        );
    }
}
