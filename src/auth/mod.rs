//! Session-based authentication.
//!
//! Login verifies credentials against the user table and issues an opaque
//! bearer token; the session carries the user's id, name, department, and
//! role list for the handlers to authorize against.

pub mod password;
pub mod routes;
pub mod session;

use axum::Json;
use axum::http::{HeaderMap, StatusCode, header};

use crate::error::AuthError;
use crate::http::AppState;
use session::Session;

/// Map an auth failure onto its HTTP response.
pub fn auth_error_response(err: AuthError) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        AuthError::MissingToken | AuthError::SessionInvalid | AuthError::InvalidCredentials => {
            StatusCode::UNAUTHORIZED
        }
        AuthError::AccountInactive | AuthError::RoleRequired { .. } => StatusCode::FORBIDDEN,
        AuthError::WeakPassword(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AuthError::Hash(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(serde_json::json!({ "error": err.to_string() })))
}

/// Pull the bearer token out of the Authorization header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolve the caller's session or produce the 401 response.
pub async fn require_session(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Session, (StatusCode, Json<serde_json::Value>)> {
    let token =
        bearer_token(headers).ok_or_else(|| auth_error_response(AuthError::MissingToken))?;

    state
        .sessions
        .get(token)
        .await
        .ok_or_else(|| auth_error_response(AuthError::SessionInvalid))
}

/// Resolve the caller's session and require a role, or produce the
/// 401/403 response.
pub async fn require_role(
    state: &AppState,
    headers: &HeaderMap,
    role: &str,
) -> Result<Session, (StatusCode, Json<serde_json::Value>)> {
    let session = require_session(state, headers).await?;
    if !session.has_role(role) {
        return Err(auth_error_response(AuthError::RoleRequired {
            role: role.to_string(),
        }));
    }
    Ok(session)
}
