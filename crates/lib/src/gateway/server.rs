//! Gateway HTTP server (single port): webhook, healthcheck, whoami.

use crate::app::App;
use crate::channels::{ChatGateway, TelegramUpdate};
use crate::config::{self, Config};
use crate::dispatch::Dispatcher;
use crate::webhook::{RetryPolicy, WebhookLifecycle, WebhookRegistration};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Header Telegram uses to send the webhook secret.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Upper bound on deleteWebhook during shutdown.
const DEREGISTER_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    webhook_key: Arc<str>,
    webhook_secret: Arc<str>,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, registration: &WebhookRegistration) -> Self {
        Self {
            dispatcher,
            webhook_key: Arc::from(registration.key()),
            webhook_secret: Arc::from(registration.secret()),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(healthcheck))
        .route("/whoami", get(whoami))
        .route("/webhook/:key", post(telegram_webhook))
        .with_state(state)
}

/// Serve the router on `listener` until `shutdown` completes.
pub async fn serve<F>(listener: tokio::net::TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("gateway server exited")
}

/// Run the bot in webhook mode: register the webhook, serve until SIGINT/SIGTERM,
/// then deregister it.
pub async fn run_gateway(config: Config, config_path: PathBuf) -> Result<()> {
    let registration = config::resolve_webhook(&config)?;
    let app = App::build(&config, &config_path)?;

    // Bound before registering so Telegram's first delivery waits in the backlog
    // instead of being refused; nothing is accepted until registration succeeded.
    let bind_addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;

    let gateway: Arc<dyn ChatGateway> = app.telegram.clone();
    let webhook = &config.telegram.webhook;
    let mut lifecycle = WebhookLifecycle::new(
        gateway,
        registration.clone(),
        RetryPolicy::from(webhook),
        webhook.drop_pending_updates,
    );
    lifecycle
        .register()
        .await
        .context("telegram webhook setup")?;

    let worker = tokio::spawn(app.worker.run());
    log::info!("gateway listening on {}", bind_addr);
    let served = serve(
        listener,
        AppState::new(app.dispatcher, &registration),
        shutdown_signal(),
    )
    .await;

    if tokio::time::timeout(DEREGISTER_TIMEOUT, lifecycle.deregister())
        .await
        .is_err()
    {
        log::warn!("webhook: deregistration timed out");
    }
    worker.abort();
    log::info!("gateway stopped");
    served
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
pub(crate) async fn shutdown_signal() {
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received");
}

/// POST /webhook/:key. Wrong key is 404, wrong secret header 401.
async fn telegram_webhook(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    if key != *state.webhook_key {
        return Err(StatusCode::NOT_FOUND);
    }
    let provided = headers
        .get(SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    if !secret_matches(provided, state.webhook_secret.as_bytes()) {
        log::warn!("gateway: webhook call with missing or wrong secret token");
        return Err(StatusCode::UNAUTHORIZED);
    }
    let update: TelegramUpdate = serde_json::from_slice(&body).map_err(|e| {
        log::debug!("gateway: undecodable webhook body: {}", e);
        StatusCode::BAD_REQUEST
    })?;
    let request_id = uuid::Uuid::new_v4().to_string();
    state.dispatcher.feed_update(update, Some(request_id)).await;
    Ok(Json(json!({ "status": "ok" })))
}

/// GET /healthcheck
async fn healthcheck() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /whoami echoes the peer address and request headers.
async fn whoami(ConnectInfo(peer): ConnectInfo<SocketAddr>, headers: HeaderMap) -> Json<Value> {
    let mut out = Map::new();
    out.insert("client.host".to_string(), json!(client_host(&headers, peer)));
    for (name, value) in headers.iter() {
        out.insert(
            name.as_str().to_string(),
            json!(String::from_utf8_lossy(value.as_bytes())),
        );
    }
    Json(Value::Object(out))
}

/// Compare without an early exit on the first differing byte.
fn secret_matches(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Client address as seen by the first proxy hop (`X-Forwarded-For`), else the peer.
fn client_host(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}
