//! HTTP API server for integration with other systems.
//!
//! Provides REST endpoints for window previews and fallacy analysis.
//! Analysis runs are serialized so the pause between model calls holds
//! across concurrent requests. Catalog and window previews never wait on a
//! running analysis.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::FallaxError;
use crate::orchestrator::{AnalysisReport, Orchestrator, WindowSummary};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
    /// Held for the duration of one `/analyze` run.
    run_lock: Mutex<()>,
}

impl AppState {
    fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            run_lock: Mutex::new(()),
        }
    }
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_settings(&settings)?;
    let app = router(Arc::new(AppState::new(orchestrator)));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Fallax API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Catalog", "GET  /fallacies");
    Output::kv("Windows", "POST /windows");
    Output::kv("Analyze", "POST /analyze");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/fallacies", get(fallacies))
        .route("/windows", post(windows))
        .route("/analyze", post(analyze))
        .layer(cors)
        .with_state(state)
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct WindowsRequest {
    text: String,
}

#[derive(Serialize)]
struct WindowsResponse {
    windows: Vec<WindowSummary>,
    total: usize,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
    #[serde(default = "default_prefix")]
    prefix: String,
    /// Overrides the configured window limit for this run (0 = no limit).
    #[serde(default)]
    max_windows: Option<usize>,
}

fn default_prefix() -> String {
    "analysis-api".to_string()
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: FallaxError) -> Response {
    let status = match e {
        FallaxError::InvalidInput(_) | FallaxError::Split(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn fallacies(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.catalog().clone())
}

async fn windows(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WindowsRequest>,
) -> Response {
    match state.orchestrator.preview(&req.text) {
        Ok(windows) => Json(WindowsResponse {
            total: windows.len(),
            windows,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    if req.text.trim().is_empty() {
        return error_response(FallaxError::InvalidInput("text is empty".to_string()));
    }

    let mut batch = state.orchestrator.batch_config().clone();
    match req.max_windows {
        Some(0) => batch.max_windows = None,
        Some(n) => batch.max_windows = Some(n),
        None => {}
    }

    let _running = state.run_lock.lock().await;
    info!("Analyzing {} characters as '{}'", req.text.len(), req.prefix);
    let result: crate::Result<AnalysisReport> = state
        .orchestrator
        .analyze_text_with(&req.text, &req.prefix, batch)
        .await;
    match result {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            warn!("Analysis request failed: {}", e);
            error_response(e)
        }
    }
}
