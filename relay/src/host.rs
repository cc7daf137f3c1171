use std::{io::ErrorKind, net::SocketAddr, path::PathBuf};

use anyhow::Context;
use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use relay_common::RelayConfig;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{context::RelayContext, lifecycle, scheduler};

#[derive(Debug, Serialize)]
struct ScheduleView {
    schedule: Vec<String>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = load_config().await.unwrap_or_else(|err| {
        warn!("failed to load relay config: {err:#}");
        let mut config = RelayConfig::default();
        config.sanitize();
        config
    });

    let addr: SocketAddr = ([0, 0, 0, 0], config.http_port).into();
    let ctx = RelayContext::new(config);
    let scheduler = scheduler::spawn_scheduler(ctx.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind relay server at {addr}"))?;

    info!("relay listening on ws://{addr}/ws");
    let result = serve(listener, ctx).await;
    scheduler.abort();
    result
}

pub fn router(ctx: RelayContext) -> Router {
    Router::new()
        .route("/ws", get(handle_ws))
        .route("/api/status", get(handle_get_status))
        .route("/api/schedule", get(handle_get_schedule))
        .route("/api/conditioning", post(handle_post_conditioning))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

pub async fn serve(listener: TcpListener, ctx: RelayContext) -> anyhow::Result<()> {
    axum::serve(listener, router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("relay server failed")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn load_config() -> anyhow::Result<RelayConfig> {
    let path = std::env::var("RELAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./relay.json"));

    let mut config = match tokio::fs::read(&path).await {
        Ok(raw) => serde_json::from_slice::<RelayConfig>(&raw)
            .with_context(|| format!("invalid relay config at {}", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound => RelayConfig::default(),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    if let Some(port) = std::env::var("RELAY_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
    {
        config.http_port = port;
    }
    if let Ok(timezone) = std::env::var("RELAY_TIMEZONE") {
        config.timezone = timezone;
    }

    config.sanitize();
    Ok(config)
}

async fn handle_ws(ws: WebSocketUpgrade, State(ctx): State<RelayContext>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| lifecycle::handle_socket(ctx, socket))
}

async fn handle_get_status(State(ctx): State<RelayContext>) -> impl IntoResponse {
    Json(ctx.status().await)
}

async fn handle_get_schedule(State(ctx): State<RelayContext>) -> impl IntoResponse {
    let schedule = ctx.lock().await.state().schedule().raw_entries();
    Json(ScheduleView { schedule })
}

async fn handle_post_conditioning(State(ctx): State<RelayContext>) -> impl IntoResponse {
    let status = {
        let mut relay = ctx.lock().await;
        let delivery = relay.begin_conditioning();
        info!(
            "manual charging and heating started ({} frames sent)",
            delivery.delivered
        );
        relay.status()
    };
    Json(status)
}
