//! Shared HTTP state and router assembly.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::auth::session::SessionStore;
use crate::error::{Error, WorkflowError};
use crate::memos::workflow::WorkflowService;
use crate::store::Database;

/// Application state shared across all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub sessions: Arc<SessionStore>,
    pub workflow: Arc<WorkflowService>,
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "memoflow"
    }))
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(crate::auth::routes::auth_routes(state.clone()))
        .merge(crate::memos::routes::memo_routes(state.clone()))
        .merge(crate::users::routes::user_routes(state.clone()))
        .merge(crate::notify::routes::notification_routes(state.clone()))
        .merge(crate::reports::report_routes(state))
        .layer(CorsLayer::permissive())
}

/// Map a service error onto an HTTP response.
///
/// Workflow-rule violations carry their own statuses; everything else is a
/// 500 with the detail kept in the server log only.
pub fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let (status, message) = match &err {
        Error::Workflow(workflow_err) => match workflow_err {
            WorkflowError::MemoNotFound { .. } | WorkflowError::StepNotFound { .. } => {
                (StatusCode::NOT_FOUND, workflow_err.to_string())
            }
            WorkflowError::NotYourTurn { .. } | WorkflowError::NotARecipient { .. } => {
                (StatusCode::FORBIDDEN, workflow_err.to_string())
            }
            WorkflowError::NotCurrentStep { .. }
            | WorkflowError::StepAlreadyDecided { .. }
            | WorkflowError::InvalidState { .. } => {
                (StatusCode::CONFLICT, workflow_err.to_string())
            }
            WorkflowError::InvalidField { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, workflow_err.to_string())
            }
        },
        _ => {
            tracing::error!(error = %err, "request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(serde_json::json!({ "error": message })))
}
