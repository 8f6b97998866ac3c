use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use orbitwatch_core::{logging, LogFormat};
use orbitwatch_live_feed::WsServer;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

mod config;
mod handlers;
mod seed;
mod state;

use config::Config;
use state::AppState;

const NODE_PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
struct NodeVersionHandshake {
    version: &'static str,
    protocol_version: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|arg| arg == "--version-json") {
        let handshake = NodeVersionHandshake {
            version: env!("CARGO_PKG_VERSION"),
            protocol_version: NODE_PROTOCOL_VERSION,
        };
        println!("{}", serde_json::to_string(&handshake)?);
        return Ok(());
    }

    let config_path = parse_config_path(&args)?
        .or_else(|| std::env::var_os("ORBITWATCH_CONFIG").map(PathBuf::from));
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;

    match config.logging.format {
        LogFormat::Text => logging::init(),
        LogFormat::Json => logging::init_json(),
    }
    if let Some(path) = &config_path {
        info!(path = %path.display(), "Configuration loaded");
    }

    let state = Arc::new(AppState::new(&config)?);

    if let Some(seed_path) = &config.store.seed_path {
        seed::load(seed_path, state.positions.as_ref()).await?;
    }

    let scanner = state
        .scanner
        .clone()
        .spawn(config.scanner.interval());

    let ws_server = Arc::new(WsServer::new(config.server.feed_addr(), state.feed.clone()));
    let forwarder = ws_server
        .clone()
        .forward_scan_reports(state.scanner.subscribe_reports(), state.desk.clone());
    let ws_task = tokio::spawn({
        let ws_server = ws_server.clone();
        async move {
            if let Err(e) = ws_server.run().await {
                error!("Live feed server stopped: {}", e);
            }
        }
    });

    let app = router(state);
    let bind_addr = config.server.http_addr();
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    info!("OrbitWatch API listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    scanner.stop().await;
    forwarder.abort();
    ws_task.abort();
    Ok(())
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/alerts", get(handlers::list_alerts))
        .route("/api/alerts/stats", get(handlers::alert_stats))
        .route("/api/alerts/:id/ack", post(handlers::acknowledge_alert))
        .route("/api/alerts/:id/resolve", post(handlers::resolve_alert))
        .route("/api/satellites/active", get(handlers::active_satellites))
        .route("/api/satellites/:id/position", put(handlers::update_position))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                // dashboards are served from other origins
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
}

async fn health_check(State(state): State<Arc<AppState>>) -> Result<Json<Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "orbitwatch-node",
        "feedSubscribers": state.feed.subscriber_count(),
        "timestamp": Utc::now().to_rfc3339()
    })))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn parse_config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    let mut args_iter = args.iter();
    while let Some(arg) = args_iter.next() {
        if arg == "--config" {
            return match args_iter.next() {
                Some(path) => Ok(Some(PathBuf::from(path))),
                None => Err(anyhow::anyhow!("--config was provided without a path")),
            };
        }
    }
    Ok(None)
}
