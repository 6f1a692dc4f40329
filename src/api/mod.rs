//! HTTP API module - REST endpoints for characters and encounters

mod characters;
mod encounters;
mod participants;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::combat::{CombatError, EncounterManager};
use crate::db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub encounters: Arc<EncounterManager>,
}

/// Build the API router
pub fn router(db: Arc<Database>, encounters: Arc<EncounterManager>) -> Router {
    let state = AppState { db, encounters };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(characters::router())
        .merge(encounters::router())
        .merge(participants::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for CombatError {
    fn into_response(self) -> Response {
        let status = match &self {
            CombatError::NotFound { .. } => StatusCode::NOT_FOUND,
            CombatError::NoParticipants | CombatError::InvalidState(_) => StatusCode::CONFLICT,
            CombatError::UnsupportedAction(_) => StatusCode::BAD_REQUEST,
            CombatError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CombatError::Database(e) => {
                error!("Database error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Handler result: JSON body or a mapped combat error
pub type ApiResult<T> = Result<Json<T>, CombatError>;

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "encounterd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::{Dice, TurnTracking};
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let db = Arc::new(Database::new(None).await.unwrap());
        let encounters =
            EncounterManager::shared(db.pool().clone(), Dice::seeded(3), TurnTracking::Participant);
        router(db, encounters)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let app = app().await;

        let (status, body) = send(&app, Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "encounterd");

        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_error_status_mapping() {
        let app = app().await;

        let (status, body) = send(&app, Method::POST, "/encounters/41/start", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "encounter 41 not found");

        let (status, _) = send(
            &app,
            Method::POST,
            "/encounters/41/actions",
            Some(json!({"actorParticipantId": 1, "actionKind": "juggle"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, created) =
            send(&app, Method::POST, "/encounters", Some(json!({"name": "Empty hall"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_i64().unwrap();

        let (status, _) = send(&app, Method::POST, &format!("/encounters/{}/advance", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        send(&app, Method::POST, &format!("/encounters/{}/start", id), None).await;
        let (status, body) = send(&app, Method::POST, &format!("/encounters/{}/advance", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "encounter has no active participants");

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/encounters/{}/actions", id),
            Some(json!({"actorParticipantId": 1, "actionKind": "juggle"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/encounters/{}/actions", id),
            Some(json!({
                "actorParticipantId": 1,
                "actionKind": "heal",
                "targetParticipantId": 1,
                "payload": {"amount": -1}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
