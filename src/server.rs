//! HTTP server for agent retrieval.
//!
//! Exposes the corpus index and the catalog via a small JSON API so agents
//! can fetch the index or query documents without crawling the static site.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/index` | Corpus index, same document as `index.json` |
//! | `POST` | `/tools/search` | Keyword search over the catalog |
//! | `POST` | `/tools/get` | Fetch one document by corpus path |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser-based clients
//! can call the API directly.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::corpus;
use crate::export::export_json;
use crate::get::get_document;
use crate::index::build_index;
use crate::search::{search_catalog, SearchParams};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config: Arc::new(config.clone()),
    };

    let app = router(state);

    println!("listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/index", get(handle_index))
        .route("/tools/search", post(handle_search))
        .route("/tools/get", post(handle_get))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

/// Map library errors onto the error contract. Lookups and validation
/// signal client errors through their messages.
fn classify_error(tool: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("not found") {
        not_found(format!("{}: {}", tool, msg))
    } else if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(format!("{}: {}", tool, msg))
    } else {
        tracing::error!(tool, error = %format!("{:#}", err), "request failed");
        internal(format!("{}: {}", tool, msg))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /index ============

/// Reads the corpus afresh on every request, so the response always matches
/// the files on disk.
async fn handle_index(State(state): State<AppState>) -> Result<Response, AppError> {
    let config = state.config.clone();
    let json = tokio::task::spawn_blocking(move || {
        let corpus = corpus::load_corpus(&config)?;
        let index = build_index(&corpus.records);
        export_json(&config, &corpus, &index)
    })
    .await
    .map_err(|e| internal(format!("index: {}", e)))?
    .map_err(|e| classify_error("index", e))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], json).into_response())
}

// ============ POST /tools/search ============

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    limit: Option<i64>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("search: query must not be empty"));
    }

    let params = SearchParams {
        query: req.query,
        category: req.category,
        tag: req.tag,
        limit: req.limit,
    };
    let results = search_catalog(&state.config, &params)
        .await
        .map_err(|e| classify_error("search", e))?;

    Ok(Json(serde_json::json!({ "result": { "results": results } })))
}

// ============ POST /tools/get ============

#[derive(Debug, Deserialize)]
struct GetRequest {
    path: String,
}

async fn handle_get(
    State(state): State<AppState>,
    Json(req): Json<GetRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.path.trim().is_empty() {
        return Err(bad_request("get: path must not be empty"));
    }

    let doc = get_document(&state.config, &req.path)
        .await
        .map_err(|e| classify_error("get", e))?;

    Ok(Json(serde_json::json!({ "result": doc })))
}
