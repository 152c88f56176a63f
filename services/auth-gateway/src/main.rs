//! Destiny Auth Gateway
//!
//! Single-binary Rust service that:
//! 1. Guards protected routes behind a Bungie.net access token
//! 2. Redirects unauthenticated browsers to the provider's authorization page
//! 3. Exchanges the returned authorization code for access/refresh tokens
//! 4. Sends the browser back to the page it originally asked for

mod auth;
mod callback;
mod config;
mod error;
mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{FromRef, State};
use axum::response::IntoResponse;
use axum::routing::get;
use bungie_auth::{ClientSession, Token};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::auth::Authenticator;
use crate::callback::CallbackState;
use crate::config::Config;

/// Upper bound on draining in-flight requests after a shutdown signal.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state accessible from all handlers
#[derive(Clone)]
struct AppState {
    auth: Authenticator,
    callback: CallbackState,
    session: Arc<ClientSession>,
    started_at: Instant,
    prometheus: PrometheusHandle,
}

impl AppState {
    fn new(
        session: Arc<ClientSession>,
        provider: bungie_auth::ProviderConfig,
        client: reqwest::Client,
        prometheus: PrometheusHandle,
    ) -> Self {
        let auth = Authenticator::new(session.clone(), provider.authorize_url.clone());
        Self {
            auth,
            callback: CallbackState {
                session: session.clone(),
                provider: Arc::new(provider),
                client,
            },
            session,
            started_at: Instant::now(),
            prometheus,
        }
    }
}

impl FromRef<AppState> for CallbackState {
    fn from_ref(state: &AppState) -> Self {
        state.callback.clone()
    }
}

/// Build the axum router with all routes and shared state.
///
/// `/session` sits behind the token guard; the callback, `/health` and
/// `/metrics` are always reachable.
fn build_router(state: AppState, callback_path: &str, max_connections: usize) -> Router {
    let protected = Router::new()
        .route("/session", get(session_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.auth.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(callback_path, get(callback::handle_callback))
        .merge(protected)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting destiny-auth-gateway");

    let prometheus_handle =
        metrics::install_recorder().context("failed to install Prometheus recorder")?;

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    let provider = config
        .provider_config()
        .context("invalid provider configuration")?;

    info!(
        listen_addr = %config.server.listen_addr,
        callback_path = %config.server.callback_path,
        authorize_url = %provider.authorize_url,
        token_url = %provider.token_url,
        "configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.provider.timeout_secs))
        .build()
        .context("failed to build HTTP client")?;

    let state = AppState::new(
        Arc::new(ClientSession::new()),
        provider,
        client,
        prometheus_handle,
    );
    let app = build_router(
        state,
        &config.server.callback_path,
        config.server.max_connections,
    );

    let listen_addr = config.server.listen_addr;
    let listener = TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind to {listen_addr}"))?;
    info!(addr = %listen_addr, "accepting requests");

    // The drain timer starts at signal receipt, not at server start: the
    // server is told to drain, then raced against DRAIN_TIMEOUT.
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all in-flight requests drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server error during shutdown"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

/// Liveness plus whether a usable access token is held.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "authorized": state.session.is_authorized().await,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Prometheus metrics endpoint in text exposition format.
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        axum::http::StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

/// Token lifecycle view for the held pair. Never includes token values.
async fn session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tokens = state.session.snapshot().await;
    let now = SystemTime::now();
    let describe = |token: &Token| {
        serde_json::json!({
            "ready": token.is_ready_at(now),
            "expired": token.is_expired_at(now),
            "expires_in_seconds": token.expires_in(now).as_secs(),
        })
    };
    let body = serde_json::json!({
        "access_token": describe(&tokens.access),
        "refresh_token": describe(&tokens.refresh),
    });

    (
        axum::http::StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
