//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

mod cli;

pub use cli::*;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sheets-proxy";
const ENV_PREFIX: &str = "SHEETS_PROXY";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8787;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_BODY_BYTES: u64 = 200 * 1024;
const DEFAULT_ALLOW_ORIGINS: [&str; 2] = ["http://127.0.0.1", "http://localhost"];
const DEFAULT_CACHE_TTL_SECS: u64 = 30;
const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;
const DEFAULT_UPSTREAM_BASE_URL: &str = "https://sheets.googleapis.com/v4/";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 15;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
const DEFAULT_GLOBAL_MAX_REQUESTS: u64 = 200;
const DEFAULT_PER_IP_MAX_REQUESTS: u64 = 30;
const DEFAULT_SHEETS_MAX_REQUESTS: u64 = 60;

/// Token value shipped in deployment templates; treated as "not configured".
pub const PLACEHOLDER_API_TOKEN: &str = "REPLACE_WITH_SECURE_RANDOM";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub auth: AuthSettings,
    pub google: GoogleSettings,
    pub upstream: UpstreamSettings,
    pub cors: CorsSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
    pub request_timeout: Duration,
    pub max_body_bytes: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
    /// `None` when unset, blank or still the deployment placeholder.
    pub api_token: Option<SecretString>,
}

impl AuthSettings {
    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct GoogleSettings {
    pub service_account_file: Option<PathBuf>,
    /// Inline credential candidates in resolution order.
    pub inline_json: Vec<SecretString>,
}

#[derive(Debug, Clone)]
pub struct UpstreamSettings {
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CorsSettings {
    pub allow_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub global: WindowSettings,
    pub per_ip: WindowSettings,
    pub sheets: WindowSettings,
}

#[derive(Debug, Clone, Copy)]
pub struct WindowSettings {
    pub window: Duration,
    pub max_requests: NonZeroU32,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("cors.allow_origins")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CheckCredentials(args)) => {
            raw.apply_credential_overrides(&args.credentials);
            raw.apply_auth_overrides(&args.auth);
        }
        Some(Command::GenerateToken(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the process arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    auth: RawAuthSettings,
    google: RawGoogleSettings,
    upstream: RawUpstreamSettings,
    cors: RawCorsSettings,
    cache: RawCacheSettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.server_request_timeout_seconds {
            self.server.request_timeout_seconds = Some(seconds);
        }
        if let Some(bytes) = overrides.server_max_body_bytes {
            self.server.max_body_bytes = Some(bytes);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(origins) = overrides.allow_origins.as_ref() {
            self.cors.allow_origins = Some(origins.clone());
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(interval) = overrides.cache_sweep_interval_seconds {
            self.cache.sweep_interval_seconds = Some(interval);
        }
        if let Some(timeout) = overrides.upstream_timeout_seconds {
            self.upstream.timeout_seconds = Some(timeout);
        }
        if let Some(url) = overrides.upstream_base_url.as_ref() {
            self.upstream.base_url = Some(url.clone());
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_global_max_requests {
            self.rate_limit.global.max_requests = Some(max);
        }
        if let Some(max) = overrides.rate_limit_per_ip_max_requests {
            self.rate_limit.per_ip.max_requests = Some(max);
        }
        if let Some(max) = overrides.rate_limit_sheets_max_requests {
            self.rate_limit.sheets.max_requests = Some(max);
        }

        self.apply_credential_overrides(&overrides.credentials);
        self.apply_auth_overrides(&overrides.auth);
    }

    fn apply_credential_overrides(&mut self, overrides: &CredentialOverrides) {
        if let Some(path) = overrides.service_account_file.as_ref() {
            self.google.service_account_file = Some(path.clone());
        }
        if let Some(json) = overrides.service_account_json.as_ref() {
            self.google.service_account_json = Some(json.clone());
        }
        if let Some(json) = overrides.credentials_json.as_ref() {
            self.google.credentials_json = Some(json.clone());
        }
    }

    fn apply_auth_overrides(&mut self, overrides: &AuthOverrides) {
        if let Some(token) = overrides.api_token.as_ref() {
            self.auth.api_token = Some(token.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            auth,
            google,
            upstream,
            cors,
            cache,
            rate_limit,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            auth: build_auth_settings(auth),
            google: build_google_settings(google),
            upstream: build_upstream_settings(upstream)?,
            cors: build_cors_settings(cors),
            cache: build_cache_settings(cache)?,
            rate_limit: build_rate_limit_settings(rate_limit)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_shutdown = non_zero_secs(
        server
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS),
        "server.graceful_shutdown_seconds",
    )?;
    let request_timeout = non_zero_secs(
        server
            .request_timeout_seconds
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        "server.request_timeout_seconds",
    )?;

    let max_body_bytes_value = server.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES);
    let max_body_bytes = usize::try_from(max_body_bytes_value)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid(
                "server.max_body_bytes",
                "must be greater than zero and fit in usize",
            )
        })?;

    Ok(ServerSettings {
        addr,
        graceful_shutdown,
        request_timeout,
        max_body_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_auth_settings(auth: RawAuthSettings) -> AuthSettings {
    let api_token = auth
        .api_token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != PLACEHOLDER_API_TOKEN)
        .map(SecretString::from);

    AuthSettings { api_token }
}

fn build_google_settings(google: RawGoogleSettings) -> GoogleSettings {
    let service_account_file = google
        .service_account_file
        .filter(|path| !path.as_os_str().is_empty());

    let inline_json = [google.service_account_json, google.credentials_json]
        .into_iter()
        .flatten()
        .filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
        .collect();

    GoogleSettings {
        service_account_file,
        inline_json,
    }
}

fn build_upstream_settings(upstream: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let raw_url = upstream
        .base_url
        .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());
    let mut base_url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("upstream.base_url", format!("invalid url: {err}")))?;
    if base_url.cannot_be_a_base() {
        return Err(LoadError::invalid(
            "upstream.base_url",
            "url cannot be used as a base",
        ));
    }
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    let timeout = non_zero_secs(
        upstream
            .timeout_seconds
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        "upstream.timeout_seconds",
    )?;

    Ok(UpstreamSettings { base_url, timeout })
}

fn build_cors_settings(cors: RawCorsSettings) -> CorsSettings {
    let allow_origins = cors
        .allow_origins
        .unwrap_or_else(|| DEFAULT_ALLOW_ORIGINS.map(str::to_string).to_vec())
        .into_iter()
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect();

    CorsSettings { allow_origins }
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl = non_zero_secs(
        cache.ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        "cache.ttl_seconds",
    )?;
    let sweep_interval = non_zero_secs(
        cache
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
        "cache.sweep_interval_seconds",
    )?;

    Ok(CacheSettings {
        ttl,
        sweep_interval,
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let shared_window = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);

    Ok(RateLimitSettings {
        global: build_window_settings(
            rate_limit.global,
            shared_window,
            DEFAULT_GLOBAL_MAX_REQUESTS,
            ("rate_limit.global.window_seconds", "rate_limit.global.max_requests"),
        )?,
        per_ip: build_window_settings(
            rate_limit.per_ip,
            shared_window,
            DEFAULT_PER_IP_MAX_REQUESTS,
            ("rate_limit.per_ip.window_seconds", "rate_limit.per_ip.max_requests"),
        )?,
        sheets: build_window_settings(
            rate_limit.sheets,
            shared_window,
            DEFAULT_SHEETS_MAX_REQUESTS,
            ("rate_limit.sheets.window_seconds", "rate_limit.sheets.max_requests"),
        )?,
    })
}

fn build_window_settings(
    scope: RawWindowSettings,
    shared_window: u64,
    default_max: u64,
    (window_key, max_key): (&'static str, &'static str),
) -> Result<WindowSettings, LoadError> {
    let window = non_zero_secs(scope.window_seconds.unwrap_or(shared_window), window_key)?;
    let max_requests = non_zero_u32(scope.max_requests.unwrap_or(default_max), max_key)?;

    Ok(WindowSettings {
        window,
        max_requests,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    api_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawGoogleSettings {
    service_account_file: Option<PathBuf>,
    service_account_json: Option<String>,
    credentials_json: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCorsSettings {
    allow_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    global: RawWindowSettings,
    per_ip: RawWindowSettings,
    sheets: RawWindowSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawWindowSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_secs(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_secs(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
