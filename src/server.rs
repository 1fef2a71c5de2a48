//! HTTP front for the engine bridge.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/command` | Run one engine operation and return the parsed report |
//! | `POST` | `/api/upload` | Store `multipart/form-data` files in the documents directory |
//! | `GET`  | `/health` | Health check (returns version and whether the engine is busy) |
//!
//! # Command Body
//!
//! ```json
//! { "command": 1, "input": "graph" }
//! { "command": "path", "input": "cat", "input2": "pet" }
//! ```
//!
//! `command` is the engine menu number (1 search, 2 process, 3 history,
//! 4 undo, 5 path) or its name.
//!
//! # Error Contract
//!
//! ```json
//! { "success": false, "error": { "code": "session_busy", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `malformed_upload` (400),
//! `session_busy` (409), `engine_unavailable` (503), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser client can
//! be served from anywhere.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::BridgeError;
use crate::models::{Operation, OperationReport};
use crate::orchestrator::Orchestrator;
use crate::upload::{self, SavedFile};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    orchestrator: Arc<Orchestrator>,
    documents_dir: Arc<PathBuf>,
}

/// Starts the HTTP server on `[server].bind` and runs until Ctrl-C.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();

    let state = AppState {
        orchestrator: Arc::new(Orchestrator::new(config)),
        documents_dir: Arc::new(config.engine.documents_dir.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/command", post(handle_command))
        .route("/api/upload", post(handle_upload))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!(
        addr = %bind_addr,
        engine = %config.engine.path.display(),
        documents = %config.engine.documents_dir.display(),
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        let status = match &err {
            BridgeError::InvalidArgument(_) | BridgeError::MalformedUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            BridgeError::SessionBusy => StatusCode::CONFLICT,
            BridgeError::EngineUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            BridgeError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        } else {
            tracing::debug!(error = %err, "request rejected");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    busy: bool,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        busy: state.orchestrator.slot().is_busy(),
    })
}

// ============ POST /api/command ============

/// Menu number or operation name.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandSelector {
    Number(u8),
    Name(String),
}

#[derive(Debug, Deserialize)]
struct CommandRequest {
    command: CommandSelector,
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    input2: Option<String>,
}

impl CommandRequest {
    fn into_operation(self) -> Result<Operation, BridgeError> {
        let name = match &self.command {
            CommandSelector::Number(1) => "search",
            CommandSelector::Number(2) => "process",
            CommandSelector::Number(3) => "history",
            CommandSelector::Number(4) => "undo",
            CommandSelector::Number(5) => "path",
            CommandSelector::Number(n) => {
                return Err(BridgeError::invalid(format!("unknown command: {}", n)))
            }
            CommandSelector::Name(name) => name.as_str(),
        };
        let input = self.input.unwrap_or_default();

        match name {
            "search" => Ok(Operation::Search(input)),
            "process" => Ok(Operation::ProcessDocuments),
            "history" => Ok(Operation::ShowHistory),
            "undo" => Ok(Operation::Undo),
            "path" => Ok(Operation::TracePath(input, self.input2.unwrap_or_default())),
            other => Err(BridgeError::invalid(format!("unknown command: {}", other))),
        }
    }
}

#[derive(Serialize)]
struct CommandResponse {
    success: bool,
    result: OperationReport,
}

async fn handle_command(
    State(state): State<AppState>,
    payload: Result<Json<CommandRequest>, JsonRejection>,
) -> Result<Json<CommandResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| BridgeError::invalid(rejection.body_text()))?;
    let op = request.into_operation()?;
    let result = state.orchestrator.execute(op).await?;
    Ok(Json(CommandResponse {
        success: true,
        result,
    }))
}

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    files: Vec<SavedFile>,
}

async fn handle_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<UploadResponse>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let files = upload::store_multipart(&state.documents_dir, content_type, &body).await?;

    Ok(Json(UploadResponse {
        success: true,
        message: format!("Successfully uploaded {} files", files.len()),
        files,
    }))
}
