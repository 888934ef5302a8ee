//! HTTP route handlers for the budget service API.
//!
//! Embeddings arrive as JSON arrays; image decoding happens upstream.

use crate::error::BudgetIndexError;
use crate::metadata::MetadataRecord;
use crate::service::{parse_top_k, BudgetEstimate, BudgetService, IngestInput};
use crate::storage::SimilarityResult;
use crate::vector::Vector;
use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

// --- Request/Response types ---

#[derive(Deserialize)]
pub struct IndexRequest {
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub budget: Option<Value>,
    #[serde(default)]
    pub reference_id: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
}

#[derive(Deserialize)]
pub struct QueryRequest {
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub top_k: Option<Value>,
}

#[derive(Serialize, Deserialize)]
pub struct IndexResponse {
    pub message: String,
    pub ordinal: usize,
    pub metadata: MetadataRecord,
}

#[derive(Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SimilarityResult>,
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub entries: usize,
    pub dimension: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

// --- Router ---

pub fn create_router(service: Arc<BudgetService>) -> Router {
    Router::new()
        .route("/index", post(index_embedding))
        .route("/search", post(search_embedding))
        .route("/estimate", post(estimate_embedding))
        .route("/health", get(health))
        .with_state(service)
}

// --- Helpers ---

fn service_error(err: BudgetIndexError) -> ApiError {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        error!("request failed: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: &str) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Text form of a loosely typed hint field: strings verbatim, other
/// scalars and objects as their JSON text.
fn hint_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn top_k(value: Option<&Value>) -> Result<Option<usize>, ApiError> {
    value
        .map(parse_top_k)
        .transpose()
        .map_err(service_error)
}

/// Run a blocking service call off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(service_error),
        Err(e) => {
            error!("worker task failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "internal error".to_string(),
                }),
            ))
        }
    }
}

// --- Handlers ---

async fn index_embedding(
    State(service): State<Arc<BudgetService>>,
    Json(req): Json<IndexRequest>,
) -> Result<(StatusCode, Json<IndexResponse>), ApiError> {
    let embedding = req
        .embedding
        .ok_or_else(|| bad_request("field 'embedding' is required"))?;
    let input = IngestInput {
        metadata: hint_text(req.metadata),
        budget: hint_text(req.budget),
        reference_id: hint_text(req.reference_id),
        status: hint_text(req.status),
    };

    let ingested = blocking(move || service.ingest(Vector::new(embedding), &input)).await?;

    Ok((
        StatusCode::CREATED,
        Json(IndexResponse {
            message: "Indexed successfully".to_string(),
            ordinal: ingested.ordinal,
            metadata: ingested.record,
        }),
    ))
}

async fn search_embedding(
    State(service): State<Arc<BudgetService>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let embedding = req
        .embedding
        .ok_or_else(|| bad_request("field 'embedding' is required"))?;
    let k = top_k(req.top_k.as_ref())?;

    let results = blocking(move || service.search(Vector::new(embedding), k)).await?;
    Ok(Json(SearchResponse { results }))
}

async fn estimate_embedding(
    State(service): State<Arc<BudgetService>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<BudgetEstimate>, ApiError> {
    let embedding = req
        .embedding
        .ok_or_else(|| bad_request("field 'embedding' is required"))?;
    let k = top_k(req.top_k.as_ref())?;

    let estimate = blocking(move || service.estimate(Vector::new(embedding), k)).await?;
    Ok(Json(estimate))
}

async fn health(
    State(service): State<Arc<BudgetService>>,
) -> Result<Json<HealthResponse>, ApiError> {
    let stats = service.stats().map_err(service_error)?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        entries: stats.entries,
        dimension: stats.dimension,
    }))
}
