//! Login, logout, and password change endpoints.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::{auth_error_response, password, require_session};
use crate::error::AuthError;
use crate::http::AppState;
use crate::store::AuditEntry;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ChangePasswordRequest {
    current_password: String,
    new_password: String,
}

/// POST /api/auth/login
///
/// Verifies credentials and issues a bearer token. The response carries the
/// session profile the UI needs (id, name, department, roles).
async fn login(State(state): State<AppState>, Json(body): Json<LoginRequest>) -> impl IntoResponse {
    let user = match state.db.get_user_by_email(&body.email).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(email = %body.email, "Login attempt for unknown email");
            return auth_error_response(AuthError::InvalidCredentials).into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Login user lookup failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Login failed"})),
            )
                .into_response();
        }
    };

    if !password::verify_password(&body.password, &user.password_hash) {
        warn!(email = %body.email, "Login attempt with wrong password");
        return auth_error_response(AuthError::InvalidCredentials).into_response();
    }

    if !user.is_active {
        return auth_error_response(AuthError::AccountInactive).into_response();
    }

    let roles = state.db.get_user_roles(user.id).await.unwrap_or_default();
    let session = state.sessions.create(&user, roles).await;

    info!(user_id = %user.id, "User logged in");
    Json(serde_json::json!({
        "token": session.token,
        "user": session,
    }))
    .into_response()
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    state.sessions.revoke(&session.token).await;
    Json(serde_json::json!({"success": true})).into_response()
}

/// POST /api/auth/password
///
/// Change the caller's own password: verify the current one, enforce the
/// minimum length, re-hash, audit.
async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let user = match state.db.get_user(session.user_id).await {
        Ok(Some(user)) => user,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "User not found"})),
            )
                .into_response();
        }
    };

    if !password::verify_password(&body.current_password, &user.password_hash) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "Your current password is incorrect"})),
        )
            .into_response();
    }

    if body.new_password.len() < 8 {
        return auth_error_response(AuthError::WeakPassword(
            "New password must be at least 8 characters long".to_string(),
        ))
        .into_response();
    }

    let new_hash = match password::hash_password(&body.new_password) {
        Ok(hash) => hash,
        Err(e) => {
            tracing::error!(error = %e, "Password hashing failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to change password"})),
            )
                .into_response();
        }
    };

    let audit = AuditEntry::new(user.id, "CHANGE_PASSWORD", "users", user.id);
    if let Err(e) = state.db.update_password(user.id, &new_hash, &audit).await {
        tracing::error!(error = %e, "Password update failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Failed to change password"})),
        )
            .into_response();
    }

    Json(serde_json::json!({"success": true})).into_response()
}

/// Build the auth routes.
pub fn auth_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/password", post(change_password))
        .with_state(state)
}
