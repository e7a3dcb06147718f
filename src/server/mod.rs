//! REST + WebSocket transport over the orchestrator and catalog.
//!
//! - `GET  /api/status`
//! - `GET  /api/models?type=&field=&search=`
//! - `GET  /api/models/summary`
//! - `GET  /api/models/{id}`
//! - `POST /api/query`
//! - `POST /api/query/batch`
//! - `GET  /ws` (progress event stream per query)

pub mod ws;

use crate::catalog::{CatalogSummary, ModelCatalog, ModelFilter, ThinkingModel};
use crate::config::ServerConfig;
use crate::error::{Error, ErrorKind, ErrorReport, Result};
use crate::llm::GenerationOptions;
use crate::query::{BatchOptions, BatchResult, QueryOrchestrator, QueryRequest, QueryResult};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ModelCatalog>,
    /// `None` when the LLM is not configured; query routes then answer 503.
    pub orchestrator: Option<Arc<QueryOrchestrator>>,
    pub started: Instant,
}

impl AppState {
    pub fn new(catalog: Arc<ModelCatalog>, orchestrator: Option<Arc<QueryOrchestrator>>) -> Self {
        Self {
            catalog,
            orchestrator,
            started: Instant::now(),
        }
    }

    fn orchestrator(&self) -> std::result::Result<&Arc<QueryOrchestrator>, ApiError> {
        self.orchestrator.as_ref().ok_or_else(|| {
            ApiError(Error::config(
                "query processing unavailable: configure the LLM endpoint (LLM_API_URL) and key",
            ))
        })
    }
}

/// Error wrapper mapping the taxonomy onto HTTP status codes.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::ModelNotFound => StatusCode::NOT_FOUND,
        ErrorKind::ConfigurationError => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ProviderUnavailable
        | ErrorKind::RequestRejected
        | ErrorKind::InvalidResponse => StatusCode::BAD_GATEWAY,
        ErrorKind::ModelFile | ErrorKind::Io | ErrorKind::Template => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from(&self.0);
        (status_for(report.kind), Json(report)).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub total_models: usize,
    pub api_configured: bool,
    pub uptime_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct QueryBody {
    pub query: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl QueryBody {
    fn into_request(self) -> QueryRequest {
        QueryRequest {
            text: self.query,
            forced_model_id: self.model,
            options: GenerationOptions {
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BatchBody {
    pub queries: Vec<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/models", get(list_models))
        .route("/api/models/summary", get(get_summary))
        .route("/api/models/{id}", get(get_model))
        .route("/api/query", post(post_query))
        .route("/api/query/batch", post(post_batch))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: &ServerConfig, state: AppState) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        %addr,
        models = state.catalog.len(),
        api_configured = state.orchestrator.is_some(),
        "web server listening"
    );
    if state.orchestrator.is_none() {
        warn!("LLM not configured, query routes will answer 503");
    }
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// -- Handlers --

pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: if state.orchestrator.is_some() {
            "healthy"
        } else {
            "limited"
        },
        total_models: state.catalog.len(),
        api_configured: state.orchestrator.is_some(),
        uptime_seconds: state.started.elapsed().as_secs_f64(),
    })
}

pub async fn list_models(
    State(state): State<AppState>,
    Query(filter): Query<ModelFilter>,
) -> Json<Vec<ThinkingModel>> {
    Json(state.catalog.list(&filter).into_iter().cloned().collect())
}

pub async fn get_summary(State(state): State<AppState>) -> Json<CatalogSummary> {
    Json(state.catalog.summary())
}

pub async fn get_model(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> std::result::Result<Json<ThinkingModel>, ApiError> {
    Ok(Json(state.catalog.get(&id)?.clone()))
}

pub async fn post_query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> std::result::Result<Json<QueryResult>, ApiError> {
    let orchestrator = state.orchestrator()?;
    let result = orchestrator.process_query(&body.into_request()).await?;
    info!(elapsed = result.processing_time, "query served");
    Ok(Json(result))
}

pub async fn post_batch(
    State(state): State<AppState>,
    Json(body): Json<BatchBody>,
) -> std::result::Result<Json<BatchResult>, ApiError> {
    let orchestrator = state.orchestrator()?;
    if body.queries.is_empty() {
        return Err(Error::invalid_input("batch must contain at least one query").into());
    }
    let options = BatchOptions {
        forced_model_id: body.model,
        generation: GenerationOptions {
            temperature: body.temperature,
            max_tokens: body.max_tokens,
        },
        parallel: body.parallel,
    };
    Ok(Json(orchestrator.process_batch(&body.queries, &options).await))
}
