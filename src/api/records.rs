use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{engine_error, ApiError};
use crate::error::{EngineError, Stage};
use crate::models::{IngestResponse, Record, StoreStats};
use crate::state::AppState;

/// Unknown enum values and other shape errors in the body are bad requests,
/// not axum's default 422.
fn decode(payload: Result<Json<Record>, JsonRejection>) -> Result<Record, ApiError> {
    match payload {
        Ok(Json(record)) => Ok(record),
        Err(JsonRejection::JsonDataError(e)) => {
            Err(engine_error(EngineError::InvalidInput(e.body_text())))
        }
        Err(rejection) => Err((rejection.status(), rejection.body_text())),
    }
}

/// POST /api/records - insert or replace one record. Embeddable records that
/// arrive without a vector are embedded first.
pub async fn ingest(
    State(state): State<AppState>,
    payload: Result<Json<Record>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let mut record = decode(payload)?;
    record.validate().map_err(engine_error)?;

    let dim = state.config.llm.embedding_dim;
    let kind = record.kind_name();
    let id = record.id();

    let mut embedded = false;
    let pending_text = match record.embeddable_mut() {
        Some(target) => match target.embedding() {
            Some(v) if v.len() != dim => {
                return Err(engine_error(EngineError::InvalidInput(format!(
                    "embedding has {} dimensions, expected {dim}",
                    v.len()
                ))));
            }
            Some(_) => {
                embedded = true;
                None
            }
            None => Some(target.embedding_text()).filter(|t| !t.trim().is_empty()),
        },
        None => None,
    };

    if let Some(text) = pending_text {
        let vector = state
            .embedder
            .embed(&[text])
            .await
            .and_then(|vectors| {
                vectors
                    .into_iter()
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("No embedding returned for {kind} {id}"))
            })
            .map_err(|e| engine_error(EngineError::upstream(Stage::Embedding, e)))?;
        if let Some(target) = record.embeddable_mut() {
            target.set_embedding(vector);
            embedded = true;
        }
    }

    state.store.upsert(record).map_err(|e| {
        tracing::error!("Failed to store {kind} {id}: {e:#}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to store record: {e}"),
        )
    })?;
    tracing::info!("Stored {kind} {id} (embedded: {embedded})");

    Ok(Json(IngestResponse { kind, id, embedded }))
}

/// GET /api/records/stats
pub async fn stats(State(state): State<AppState>) -> Json<StoreStats> {
    Json(state.store.stats())
}
