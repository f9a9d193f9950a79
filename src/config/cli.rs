use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the sheets-proxy binary.
#[derive(Debug, Parser)]
#[command(
    name = "sheets-proxy",
    version,
    about = "Google Sheets access proxy for production reporting"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SHEETS_PROXY_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP proxy.
    Serve(Box<ServeArgs>),
    /// Resolve the Google service-account credential and report whether it is usable.
    #[command(name = "check-credentials")]
    CheckCredentials(CheckCredentialsArgs),
    /// Print a random bearer token suitable for `API_TOKEN`.
    #[command(name = "generate-token")]
    GenerateToken(GenerateTokenArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CheckCredentialsArgs {
    #[command(flatten)]
    pub credentials: CredentialOverrides,

    #[command(flatten)]
    pub auth: AuthOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct GenerateTokenArgs {
    /// Number of random bytes to encode (minimum 24).
    #[arg(long, default_value_t = 48, value_parser = clap::value_parser!(usize))]
    pub bytes: usize,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CredentialOverrides {
    /// Path to a service-account JSON key file.
    #[arg(
        long = "google-service-account-file",
        env = "GOOGLE_SERVICE_ACCOUNT_FILE",
        value_name = "PATH"
    )]
    pub service_account_file: Option<PathBuf>,

    /// Inline service-account JSON.
    #[arg(
        long = "google-service-account-json",
        env = "GOOGLE_SERVICE_ACCOUNT_JSON",
        value_name = "JSON",
        hide_env_values = true
    )]
    pub service_account_json: Option<String>,

    /// Legacy name for the inline service-account JSON.
    #[arg(
        long = "google-credentials-json",
        env = "GOOGLE_CREDENTIALS_JSON",
        value_name = "JSON",
        hide = true,
        hide_env_values = true
    )]
    pub credentials_json: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct AuthOverrides {
    /// Shared bearer token required on `/api/sheets` routes.
    #[arg(
        long = "api-token",
        env = "API_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true
    )]
    pub api_token: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub credentials: CredentialOverrides,

    #[command(flatten)]
    pub auth: AuthOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", env = "PORT", value_name = "PORT")]
    pub port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the per-request timeout.
    #[arg(long = "server-request-timeout-seconds", value_name = "SECONDS")]
    pub server_request_timeout_seconds: Option<u64>,

    /// Override the maximum accepted JSON body size in bytes.
    #[arg(long = "server-max-body-bytes", value_name = "BYTES")]
    pub server_max_body_bytes: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Comma separated CORS origin allowlist.
    #[arg(
        long = "allow-origins",
        env = "ALLOW_ORIGINS",
        value_name = "ORIGINS",
        value_delimiter = ','
    )]
    pub allow_origins: Option<Vec<String>>,

    /// Override the read cache TTL.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override how often expired cache entries are swept.
    #[arg(long = "cache-sweep-interval-seconds", value_name = "SECONDS")]
    pub cache_sweep_interval_seconds: Option<u64>,

    /// Override the upstream request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,

    /// Override the Sheets API base URL.
    #[arg(long = "upstream-base-url", value_name = "URL")]
    pub upstream_base_url: Option<String>,

    /// Override the global rate limit ceiling.
    #[arg(long = "rate-limit-global-max-requests", value_name = "COUNT")]
    pub rate_limit_global_max_requests: Option<u64>,

    /// Override the per-IP rate limit ceiling.
    #[arg(long = "rate-limit-per-ip-max-requests", value_name = "COUNT")]
    pub rate_limit_per_ip_max_requests: Option<u64>,

    /// Override the sheets endpoint group rate limit ceiling.
    #[arg(long = "rate-limit-sheets-max-requests", value_name = "COUNT")]
    pub rate_limit_sheets_max_requests: Option<u64>,

    /// Override the window shared by all rate limit scopes.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,
}
