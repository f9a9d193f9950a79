use std::{future::IntoFuture, net::SocketAddr, process::ExitCode, sync::Arc, time::Duration};

use futures::FutureExt;
use serde_json::json;
use sheets_proxy::{
    application::{
        error::AppError,
        gateway::SheetsGateway,
        tokens::generate_api_token,
    },
    cache::{CacheConfig, ResponseCache},
    config::{self, Command, GenerateTokenArgs, Settings},
    infra::{
        error::InfraError,
        google::{self, CredentialLoader, GoogleSheetsClient, credentials},
        http::{
            self, ApiState, EdgeConfig,
            api::{auth::BearerAuth, rate_limit::RateLimiters},
        },
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const CHECK_FAILED_EXIT: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            report_application_error(&error);
            ExitCode::FAILURE
        }
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<ExitCode, AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(Command::Serve(Box::<config::ServeArgs>::default()));

    match command {
        Command::Serve(_) => run_serve(settings).await.map(|()| ExitCode::SUCCESS),
        Command::CheckCredentials(_) => Ok(run_check_credentials(&settings)),
        Command::GenerateToken(args) => run_generate_token(&args),
    }
}

fn run_check_credentials(settings: &Settings) -> ExitCode {
    match credentials::check(settings) {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}", json!(report));
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("{}", json!({ "ok": false, "error": err.to_string() }));
            ExitCode::from(CHECK_FAILED_EXIT)
        }
    }
}

fn run_generate_token(args: &GenerateTokenArgs) -> Result<ExitCode, AppError> {
    let token = generate_api_token(args.bytes).map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{token}");
    Ok(ExitCode::SUCCESS)
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    telemetry::init(&settings.logging)?;

    let http_client = google::build_http_client(settings.upstream.timeout)?;
    let loader = Arc::new(CredentialLoader::new(
        settings.google.clone(),
        http_client.clone(),
    ));
    if !loader.is_configured() {
        warn!(
            target = "sheets_proxy::serve",
            "no usable Google credentials found; sheets endpoints will answer 503"
        );
    }
    if !settings.auth.is_configured() {
        warn!(
            target = "sheets_proxy::serve",
            "API_TOKEN not configured; sheets endpoints will answer 503"
        );
    }

    let upstream = Arc::new(GoogleSheetsClient::new(
        http_client,
        settings.upstream.base_url.clone(),
        loader,
    ));
    let cache = Arc::new(ResponseCache::new(CacheConfig::from(&settings.cache)));
    let gateway = Arc::new(SheetsGateway::new(
        upstream,
        Arc::clone(&cache),
        settings.upstream.timeout,
    ));
    let state = ApiState::new(
        gateway,
        BearerAuth::new(settings.auth.api_token.as_ref()),
        RateLimiters::from_settings(&settings.rate_limit),
    );

    let sweeper = spawn_sweeper(
        Arc::clone(&cache),
        Arc::clone(&state.rate_limiters),
        settings.cache.sweep_interval,
    );
    let result = serve_http(&settings, state).await;
    sweeper.abort();
    let _ = sweeper.await;

    result
}

fn spawn_sweeper(
    cache: Arc<ResponseCache>,
    rate_limiters: Arc<RateLimiters>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let expired = cache.purge_expired();
            let windows = rate_limiters.sweep();
            if expired > 0 || windows > 0 {
                info!(
                    target = "sheets_proxy::sweeper",
                    expired_entries = expired,
                    stale_windows = windows,
                    "sweep completed"
                );
            }
        }
    })
}

async fn serve_http(settings: &Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state, &EdgeConfig::from_settings(settings));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::bind(settings.server.addr, err)))?;
    info!(
        target = "sheets_proxy::serve",
        addr = %settings.server.addr,
        "sheets-proxy listening"
    );

    let signal = shutdown_signal().boxed().shared();
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal.clone())
    .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        signal.await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
            info!(target = "sheets_proxy::serve", "server stopped");
        }
        () = deadline => {
            warn!(
                target = "sheets_proxy::serve",
                grace_secs = grace.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "sheets_proxy::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(target = "sheets_proxy::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!(target = "sheets_proxy::serve", "shutdown signal received");
}
