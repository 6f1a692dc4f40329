//! Character API - feeds the combatant registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use super::{ApiResult, AppState};
use crate::combat::{CombatError, Combatant, NewCombatant};

/// Build the character router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/characters", get(list_characters).post(create_character))
        .route("/characters/{id}", get(get_character))
}

/// GET /characters
async fn list_characters(State(state): State<AppState>) -> ApiResult<Vec<Combatant>> {
    Ok(Json(state.encounters.registry().list().await?))
}

/// POST /characters
async fn create_character(
    State(state): State<AppState>,
    Json(request): Json<NewCombatant>,
) -> Result<(StatusCode, Json<Combatant>), CombatError> {
    let combatant = state.encounters.registry().create(&request).await?;
    Ok((StatusCode::CREATED, Json(combatant)))
}

/// GET /characters/{id}
async fn get_character(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Combatant> {
    Ok(Json(state.encounters.registry().get(id).await?))
}
