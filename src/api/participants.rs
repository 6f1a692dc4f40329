//! Participant API - administrative overrides on a single participant

use axum::{
    extract::{Path, State},
    routing::{delete, put},
    Json, Router,
};
use serde::Deserialize;

use super::{ApiResult, AppState};
use crate::combat::Participant;

/// Build the participant router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/participants/{id}/hp", put(set_hp))
        .route("/participants/{id}/conditions", put(set_conditions))
        .route(
            "/participants/{id}/conditions/{label}",
            delete(remove_condition),
        )
        .route("/participants/{id}/active", put(set_active))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetHpRequest {
    current_hp: i64,
}

#[derive(Debug, Deserialize)]
struct SetConditionsRequest {
    conditions: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SetActiveRequest {
    active: bool,
}

/// PUT /participants/{id}/hp
/// Clamped to the participant's HP range
async fn set_hp(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetHpRequest>,
) -> ApiResult<Participant> {
    Ok(Json(state.encounters.set_hp(id, request.current_hp).await?))
}

/// PUT /participants/{id}/conditions
async fn set_conditions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetConditionsRequest>,
) -> ApiResult<Participant> {
    Ok(Json(
        state
            .encounters
            .set_conditions(id, &request.conditions)
            .await?,
    ))
}

/// DELETE /participants/{id}/conditions/{label}
async fn remove_condition(
    State(state): State<AppState>,
    Path((id, label)): Path<(i64, String)>,
) -> ApiResult<Participant> {
    Ok(Json(state.encounters.remove_condition(id, &label).await?))
}

/// PUT /participants/{id}/active
async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<Participant> {
    Ok(Json(
        state
            .encounters
            .set_participant_active(id, request.active)
            .await?,
    ))
}
