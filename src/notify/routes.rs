//! REST endpoints for in-app notifications.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::auth::require_session;
use crate::http::{AppState, error_response};

/// How many notifications the bell shows.
const NOTIFICATION_LIMIT: usize = 20;

/// GET /api/notifications — the caller's latest notifications.
async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state
        .db
        .list_notifications(session.user_id, NOTIFICATION_LIMIT)
        .await
    {
        Ok(notifications) => Json(notifications).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// POST /api/notifications/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state.db.mark_notification_read(id, session.user_id).await {
        Ok(true) => Json(serde_json::json!({"success": true})).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Notification not found"})),
        )
            .into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// Build the notification routes.
pub fn notification_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/{id}/read", post(mark_read))
        .with_state(state)
}
