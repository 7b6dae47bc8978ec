//! REST endpoints for user administration and directory lookups.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{require_role, require_session};
use crate::http::{AppState, error_response};
use crate::store::AuditEntry;
use crate::users::directory::{self, CreateUserOutcome, DeleteUserOutcome};
use crate::users::model::{NewUser, UserUpdate, role};

#[derive(Debug, Deserialize)]
struct DirectoryQuery {
    #[serde(default)]
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToggleRequest {
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct DuplicateQuery {
    #[serde(default)]
    staff_id: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HrSearchQuery {
    #[serde(default)]
    q: Option<String>,
}

/// GET /api/users — the admin directory.
async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DirectoryQuery>,
) -> impl IntoResponse {
    if let Err(response) = require_role(&state, &headers, role::ADMINISTRATOR).await {
        return response.into_response();
    }

    match state.db.list_directory(query.q.as_deref()).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// POST /api/users — create an account.
async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewUser>,
) -> impl IntoResponse {
    let session = match require_role(&state, &headers, role::ADMINISTRATOR).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match directory::create_user(state.db.as_ref(), session.user_id, body).await {
        Ok(CreateUserOutcome::Created { id }) => {
            info!(user_id = %id, admin = %session.user_id, "User account created");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"success": true, "id": id})),
            )
                .into_response()
        }
        Ok(CreateUserOutcome::Duplicate { message }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"success": false, "error": message})),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// PUT /api/users/{id} — update profile, roles, and active flag.
async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<UserUpdate>,
) -> impl IntoResponse {
    let session = match require_role(&state, &headers, role::ADMINISTRATOR).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let audit = AuditEntry::new(session.user_id, "UPDATE_USER", "users", id);
    match state.db.update_user(id, &body, &audit).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// POST /api/users/{id}/toggle — activate or deactivate an account.
async fn toggle_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<ToggleRequest>,
) -> impl IntoResponse {
    let session = match require_role(&state, &headers, role::ADMINISTRATOR).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let audit = AuditEntry::new(session.user_id, "TOGGLE_USER_STATUS", "users", id)
        .with_value(serde_json::json!({"is_active": body.is_active}));
    match state.db.set_user_active(id, body.is_active, &audit).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// DELETE /api/users/{id} — remove an account with no institutional records.
async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let session = match require_role(&state, &headers, role::ADMINISTRATOR).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match directory::delete_user(state.db.as_ref(), session.user_id, id).await {
        Ok(DeleteUserOutcome::Deleted) => {
            Json(serde_json::json!({"success": true})).into_response()
        }
        Ok(DeleteUserOutcome::HasRecords { message }) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"success": false, "error": message})),
        )
            .into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /api/users/managers — users holding the Line Manager role.
async fn managers(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(response) = require_session(&state, &headers).await {
        return response.into_response();
    }

    match state.db.list_users_with_role(role::LINE_MANAGER).await {
        Ok(users) => Json(users).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// GET /api/users/recipients — active users for the recipient picker.
async fn recipients(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(response) = require_session(&state, &headers).await {
        return response.into_response();
    }

    match state.db.list_active_users().await {
        Ok(users) => Json(users).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// GET /api/users/check-duplicate — pre-flight probe for the create form.
async fn check_duplicate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DuplicateQuery>,
) -> impl IntoResponse {
    if let Err(response) = require_session(&state, &headers).await {
        return response.into_response();
    }

    let (staff_id, email) = match (&query.staff_id, &query.email) {
        (None, None) => return Json(serde_json::json!({"exists": false})).into_response(),
        (staff_id, email) => (
            staff_id.clone().unwrap_or_default(),
            email.clone().unwrap_or_default(),
        ),
    };

    match state.db.find_duplicate_user(&staff_id, &email).await {
        Ok(Some(user)) => Json(serde_json::json!({
            "exists": true,
            "status": if user.is_active { "Active" } else { "Inactive" },
            "roles": if user.roles.is_empty() {
                "No roles assigned".to_string()
            } else {
                user.roles.join(", ")
            },
            "username": user.username,
        }))
        .into_response(),
        Ok(None) => Json(serde_json::json!({"exists": false})).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// GET /api/hr/search — lookup in the HR staff feed.
async fn hr_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HrSearchQuery>,
) -> impl IntoResponse {
    if let Err(response) = require_session(&state, &headers).await {
        return response.into_response();
    }

    let term = query.q.unwrap_or_default();
    if term.is_empty() {
        return Json(serde_json::json!([])).into_response();
    }

    match state.db.search_hr_staff(&term, 15).await {
        Ok(staff) => Json(staff).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// Build the user routes.
pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route("/api/users/managers", get(managers))
        .route("/api/users/recipients", get(recipients))
        .route("/api/users/check-duplicate", get(check_duplicate))
        .route("/api/users/{id}", put(update_user).delete(delete_user))
        .route("/api/users/{id}/toggle", post(toggle_user))
        .route("/api/hr/search", get(hr_search))
        .with_state(state)
}
