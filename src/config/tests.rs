use secrecy::ExposeSecret;

use super::*;

#[test]
fn defaults_match_service_contract() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
    assert_eq!(settings.server.request_timeout, Duration::from_secs(30));
    assert_eq!(settings.server.max_body_bytes.get(), 200 * 1024);
    assert_eq!(settings.cache.ttl, Duration::from_secs(30));
    assert_eq!(settings.cache.sweep_interval, Duration::from_secs(60));
    assert_eq!(settings.upstream.timeout, Duration::from_secs(15));
    assert_eq!(settings.rate_limit.global.max_requests.get(), 200);
    assert_eq!(settings.rate_limit.per_ip.max_requests.get(), 30);
    assert_eq!(settings.rate_limit.sheets.max_requests.get(), 60);
    assert_eq!(settings.rate_limit.sheets.window, Duration::from_secs(60));
    assert_eq!(
        settings.cors.allow_origins,
        vec!["http://127.0.0.1".to_string(), "http://localhost".to_string()]
    );
    assert!(!settings.auth.is_configured());
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn placeholder_token_counts_as_unconfigured() {
    let mut raw = RawSettings::default();
    raw.auth.api_token = Some(PLACEHOLDER_API_TOKEN.to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.auth.is_configured());

    let mut raw = RawSettings::default();
    raw.auth.api_token = Some("   ".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(!settings.auth.is_configured());
}

#[test]
fn api_token_is_trimmed() {
    let mut raw = RawSettings::default();
    raw.auth.api_token = Some("  s3cret \n".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");

    let token = settings.auth.api_token.expect("token configured");
    assert_eq!(token.expose_secret(), "s3cret");
}

#[test]
fn inline_credentials_keep_resolution_order() {
    let mut raw = RawSettings::default();
    let overrides = CredentialOverrides {
        service_account_json: Some("{\"primary\":true}".to_string()),
        credentials_json: Some("{\"legacy\":true}".to_string()),
        ..Default::default()
    };
    raw.apply_credential_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    let inline: Vec<&str> = settings
        .google
        .inline_json
        .iter()
        .map(|value| value.expose_secret())
        .collect();
    assert_eq!(inline, vec!["{\"primary\":true}", "{\"legacy\":true}"]);
}

#[test]
fn per_scope_window_falls_back_to_shared_window() {
    let mut raw = RawSettings::default();
    raw.rate_limit.window_seconds = Some(10);
    raw.rate_limit.per_ip.window_seconds = Some(5);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.rate_limit.global.window, Duration::from_secs(10));
    assert_eq!(settings.rate_limit.per_ip.window, Duration::from_secs(5));
    assert_eq!(settings.rate_limit.sheets.window, Duration::from_secs(10));
}

#[test]
fn zero_limits_are_rejected() {
    let mut raw = RawSettings::default();
    raw.rate_limit.sheets.max_requests = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero limit rejected");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "rate_limit.sheets.max_requests",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.cache.ttl_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn upstream_base_url_gains_trailing_slash() {
    let mut raw = RawSettings::default();
    raw.upstream.base_url = Some("http://127.0.0.1:9000/v4".to_string());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.upstream.base_url.as_str(), "http://127.0.0.1:9000/v4/");
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sheets-proxy"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_generate_token_arguments() {
    let args = CliArgs::parse_from(["sheets-proxy", "generate-token", "--bytes", "32"]);
    match args.command.expect("generate-token command") {
        Command::GenerateToken(generate) => assert_eq!(generate.bytes, 32),
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_allow_origins_list() {
    let args = CliArgs::parse_from([
        "sheets-proxy",
        "serve",
        "--allow-origins",
        "https://a.example,https://b.example",
        "--rate-limit-sheets-max-requests",
        "5",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(
                serve.overrides.allow_origins,
                Some(vec![
                    "https://a.example".to_string(),
                    "https://b.example".to_string()
                ])
            );
            assert_eq!(serve.overrides.rate_limit_sheets_max_requests, Some(5));
        }
        _ => panic!("wrong command parsed"),
    }
}
