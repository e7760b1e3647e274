pub mod ai;
pub mod records;

use std::future::Future;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::EngineError;
use crate::search::metric::DistanceMetric;
use crate::state::AppState;

pub type ApiError = (StatusCode, String);

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ai/search", post(ai::search))
        .route("/api/ai/ideas", post(ai::generate_ideas))
        .route("/api/ai/requirements", post(ai::generate_requirements))
        .route("/api/ai/change-request", post(ai::generate_change_request))
        .route("/api/records", post(records::ingest))
        .route("/api/records/stats", get(records::stats))
        .route("/api/config", get(get_config))
        .with_state(state)
}

/// Map an engine failure to a status code. Collaborator failures are logged
/// here since this is where they stop propagating.
pub fn engine_error(err: EngineError) -> ApiError {
    let status = match &err {
        EngineError::InvalidInput(_) | EngineError::InvalidEnumValue { .. } => {
            StatusCode::BAD_REQUEST
        }
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::Upstream { .. } | EngineError::MalformedOutput { .. } => {
            tracing::error!("{err}");
            StatusCode::BAD_GATEWAY
        }
    };
    (status, err.to_string())
}

/// Bound a whole pipeline call; an elapsed budget becomes 504.
pub async fn with_timeout<T>(
    secs: u64,
    fut: impl Future<Output = crate::error::Result<T>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result.map_err(engine_error),
        Err(_) => {
            tracing::error!("Pipeline exceeded its {secs}s budget");
            Err((
                StatusCode::GATEWAY_TIMEOUT,
                format!("Pipeline timed out after {secs}s"),
            ))
        }
    }
}

/// Config response with API key redacted
#[derive(Serialize)]
pub struct ConfigResponse {
    pub provider: String,
    pub base_url: String,
    pub chat_model: String,
    pub expansion_model: String,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub has_api_key: bool,
    pub distance_metric: DistanceMetric,
    pub search_per_type: usize,
    pub search_cap: usize,
    pub extraction_per_type: usize,
    pub extraction_cap: usize,
    pub pipeline_timeout_secs: u64,
}

/// GET /api/config
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let llm = &state.config.llm;
    let retrieval = &state.config.retrieval;
    Json(ConfigResponse {
        provider: llm.provider.clone(),
        base_url: llm.base_url.clone(),
        chat_model: llm.chat_model.clone(),
        expansion_model: llm.expansion_model().to_string(),
        embedding_model: llm.embedding_model.clone(),
        embedding_dim: llm.embedding_dim,
        has_api_key: llm.api_key.is_some(),
        distance_metric: retrieval.metric,
        search_per_type: retrieval.search.per_type_limit,
        search_cap: retrieval.search.cap,
        extraction_per_type: retrieval.extraction.per_type_limit,
        extraction_cap: retrieval.extraction.cap,
        pipeline_timeout_secs: retrieval.pipeline_timeout_secs,
    })
}
