use axum::extract::State;
use axum::Json;
use uuid::Uuid;

use crate::api::{engine_error, with_timeout, ApiError};
use crate::error::EngineError;
use crate::models::{
    GenerateChangeRequestRequest, GenerateIdeasRequest, GenerateRequirementsRequest,
    RequirementVersion, SearchAnswer, SearchRequest,
};
use crate::pipeline::drafts::{ExtractedChangeRequest, ExtractedIdeas, ExtractedRequirements};
use crate::state::AppState;

fn required(value: &str, what: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        Err(engine_error(EngineError::InvalidInput(format!(
            "{what} is required"
        ))))
    } else {
        Ok(value.to_string())
    }
}

/// POST /api/ai/search - expand the question, retrieve context and answer it.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchAnswer>, ApiError> {
    let query = required(&req.query, "Query")?;
    let budget = state.config.retrieval.pipeline_timeout_secs;
    let answer = with_timeout(budget, state.engine.search(&query)).await?;
    Ok(Json(answer))
}

/// POST /api/ai/ideas - extract idea drafts from free text (e.g. a meeting
/// transcript). Drafts are returned, not stored.
pub async fn generate_ideas(
    State(state): State<AppState>,
    Json(req): Json<GenerateIdeasRequest>,
) -> Result<Json<ExtractedIdeas>, ApiError> {
    let text = required(&req.text, "Text")?;
    let budget = state.config.retrieval.pipeline_timeout_secs;
    let ideas = with_timeout(budget, state.engine.generate_ideas(&text)).await?;
    Ok(Json(ideas))
}

/// POST /api/ai/requirements - draft requirements from stored ideas.
pub async fn generate_requirements(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequirementsRequest>,
) -> Result<Json<ExtractedRequirements>, ApiError> {
    if req.idea_ids.is_empty() {
        return Err(engine_error(EngineError::InvalidInput(
            "at least one idea id is required".to_string(),
        )));
    }

    let ideas = state.store.ideas_by_ids(&req.idea_ids);
    if ideas.is_empty() {
        return Err(engine_error(EngineError::NotFound(
            "any of the requested ideas".to_string(),
        )));
    }
    if ideas.len() < req.idea_ids.len() {
        tracing::warn!(
            "Only {} of {} requested ideas exist",
            ideas.len(),
            req.idea_ids.len()
        );
    }

    let budget = state.config.retrieval.pipeline_timeout_secs;
    let requirements = with_timeout(budget, state.engine.generate_requirements(&ideas)).await?;
    Ok(Json(requirements))
}

/// POST /api/ai/change-request - analyse the impact of moving a requirement
/// from one version to another.
pub async fn generate_change_request(
    State(state): State<AppState>,
    Json(req): Json<GenerateChangeRequestRequest>,
) -> Result<Json<ExtractedChangeRequest>, ApiError> {
    if state.store.requirement(req.requirement_id).is_none() {
        return Err(engine_error(EngineError::NotFound(format!(
            "requirement {}",
            req.requirement_id
        ))));
    }
    let base =
        version_of(&state, req.base_version_id, req.requirement_id).map_err(engine_error)?;
    let proposed =
        version_of(&state, req.next_version_id, req.requirement_id).map_err(engine_error)?;

    let budget = state.config.retrieval.pipeline_timeout_secs;
    let change = with_timeout(
        budget,
        state.engine.generate_change_request(&base, &proposed),
    )
    .await?;
    Ok(Json(change))
}

fn version_of(
    state: &AppState,
    version_id: Uuid,
    requirement_id: Uuid,
) -> Result<RequirementVersion, EngineError> {
    let version = state
        .store
        .requirement_version(version_id)
        .ok_or_else(|| EngineError::NotFound(format!("requirement version {version_id}")))?;
    if version.requirement_id != requirement_id {
        return Err(EngineError::InvalidInput(format!(
            "version {version_id} does not belong to requirement {requirement_id}"
        )));
    }
    Ok(version)
}
