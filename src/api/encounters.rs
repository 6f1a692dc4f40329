//! Encounter API - lifecycle, roster, turns and actions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{ApiResult, AppState};
use crate::combat::{
    ActionOutcome, CombatError, Encounter, LogEntry, Participant, ParticipantView,
};

/// Build the encounter router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/encounters", get(list_encounters).post(create_encounter))
        .route("/encounters/active", get(active_encounter))
        .route("/encounters/{id}", get(get_encounter))
        .route("/encounters/{id}/start", post(start_encounter))
        .route("/encounters/{id}/end", put(end_encounter))
        .route(
            "/encounters/{id}/participants",
            get(list_participants).post(add_participants),
        )
        .route("/encounters/{id}/advance", post(advance))
        .route("/encounters/{id}/current", get(current_actor))
        .route("/encounters/{id}/actions", post(apply_action))
        .route("/encounters/{id}/log", get(action_log))
}

/// Encounter creation request
#[derive(Debug, Deserialize)]
struct CreateEncounterRequest {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddParticipantsRequest {
    combatant_ids: Vec<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActionRequest {
    actor_participant_id: i64,
    action_kind: String,
    #[serde(default)]
    target_participant_id: Option<i64>,
    #[serde(default)]
    payload: Value,
    /// Advance the turn afterwards when the action normally ends one
    #[serde(default)]
    auto_advance: bool,
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    #[serde(flatten)]
    outcome: ActionOutcome,
    /// Encounter after the automatic advance, if one happened
    #[serde(skip_serializing_if = "Option::is_none")]
    encounter: Option<Encounter>,
}

/// GET /encounters
async fn list_encounters(State(state): State<AppState>) -> ApiResult<Vec<Encounter>> {
    Ok(Json(state.encounters.list_encounters().await?))
}

/// POST /encounters
async fn create_encounter(
    State(state): State<AppState>,
    Json(request): Json<CreateEncounterRequest>,
) -> Result<(StatusCode, Json<Encounter>), CombatError> {
    let encounter = state
        .encounters
        .create_encounter(&request.name, request.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(encounter)))
}

/// GET /encounters/active
/// The running encounter, or null
async fn active_encounter(State(state): State<AppState>) -> ApiResult<Option<Encounter>> {
    Ok(Json(state.encounters.active_encounter().await?))
}

/// GET /encounters/{id}
async fn get_encounter(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Encounter> {
    Ok(Json(state.encounters.get_encounter(id).await?))
}

/// POST /encounters/{id}/start
async fn start_encounter(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Encounter> {
    Ok(Json(state.encounters.start(id).await?))
}

/// PUT /encounters/{id}/end
async fn end_encounter(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Encounter> {
    Ok(Json(state.encounters.end(id).await?))
}

/// GET /encounters/{id}/participants
/// Active participants in turn order
async fn list_participants(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<ParticipantView>> {
    Ok(Json(state.encounters.participants(id).await?))
}

/// POST /encounters/{id}/participants
async fn add_participants(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<AddParticipantsRequest>,
) -> ApiResult<Vec<Participant>> {
    Ok(Json(
        state
            .encounters
            .add_participants(id, &request.combatant_ids)
            .await?,
    ))
}

/// POST /encounters/{id}/advance
async fn advance(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Encounter> {
    Ok(Json(state.encounters.advance(id).await?))
}

/// GET /encounters/{id}/current
async fn current_actor(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Option<ParticipantView>> {
    Ok(Json(state.encounters.current_actor(id).await?))
}

/// POST /encounters/{id}/actions
async fn apply_action(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<ActionRequest>,
) -> ApiResult<ActionResponse> {
    let outcome = state
        .encounters
        .apply(
            id,
            request.actor_participant_id,
            &request.action_kind,
            request.target_participant_id,
            &request.payload,
        )
        .await?;

    let encounter = if request.auto_advance && outcome.kind.ends_turn() {
        debug!("Auto-advancing encounter {} after {}", id, outcome.kind);
        Some(state.encounters.advance(id).await?)
    } else {
        None
    };

    Ok(Json(ActionResponse { outcome, encounter }))
}

/// GET /encounters/{id}/log
async fn action_log(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Vec<LogEntry>> {
    Ok(Json(state.encounters.log(id).await?))
}
