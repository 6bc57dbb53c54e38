// Web server — Axum-based HTTP surface for the analysis pipeline.
//
// POST /api/analyze/{source} runs the same operation as `rivalscan run`
// and answers with the same Run Result document the CLI writes to disk.
// Only one run per source may be in flight at a time.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::models::SourceKind;

pub mod handlers;

/// Shared application state threaded through all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// When set, runs replay `<dir>/<source>.json` instead of calling the
    /// platforms.
    pub fixture_dir: Option<PathBuf>,
    running: Arc<Mutex<HashSet<SourceKind>>>,
}

impl AppState {
    pub fn new(config: Config, fixture_dir: Option<PathBuf>) -> Self {
        Self {
            config: Arc::new(config),
            fixture_dir,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Claim the run slot for `source`. `None` if a run is already active.
    /// The slot is released when the returned guard drops, including when
    /// the client disconnects mid-run.
    pub fn try_start(&self, source: SourceKind) -> Option<RunSlot> {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.insert(source).then(|| RunSlot {
            running: Arc::clone(&self.running),
            source,
        })
    }
}

pub struct RunSlot {
    running: Arc<Mutex<HashSet<SourceKind>>>,
    source: SourceKind,
}

impl Drop for RunSlot {
    fn drop(&mut self) {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.remove(&self.source);
    }
}

/// Start the Axum web server and block until it exits.
pub async fn run_server(
    config: Config,
    fixture_dir: Option<PathBuf>,
    port: u16,
    bind: &str,
) -> Result<()> {
    let app = build_router(AppState::new(config, fixture_dir));

    let addr = format!("{bind}:{port}");
    info!("rivalscan listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/accounts", get(handlers::accounts::list_accounts))
        .route(
            "/api/analyze/{source}",
            post(handlers::analyze::run_analysis),
        )
        .route("/api/results/{source}", get(handlers::results::get_results))
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check — always returns 200 OK.
async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        axum::Json(serde_json::json!({ "status": "ok" })),
    )
}

/// Typed JSON error response helper.
pub fn api_error(status: StatusCode, message: &str) -> Response {
    (status, axum::Json(serde_json::json!({ "error": message }))).into_response()
}

/// Parse the `{source}` path segment or answer 404.
pub fn parse_source(raw: &str) -> Result<SourceKind, Response> {
    raw.parse::<SourceKind>()
        .map_err(|e| api_error(StatusCode::NOT_FOUND, &e))
}
