//! REST endpoints for memos and the approval workflow.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::require_session;
use crate::http::{AppState, error_response};
use crate::memos::model::{ApprovalStatus, Attachment, NewMemo};
use crate::store::{ApprovalView, MemoWithCreator, RecipientView};

#[derive(Debug, Deserialize)]
struct CreateMemoRequest {
    #[serde(flatten)]
    memo: NewMemo,
    #[serde(default)]
    is_draft: bool,
}

#[derive(Debug, Deserialize)]
struct ApproveRequest {
    approval_id: Uuid,
}

#[derive(Debug, Deserialize)]
struct RejectRequest {
    approval_id: Uuid,
    #[serde(default)]
    comments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: Option<String>,
}

/// The caller's relationship to a memo, precomputed for the UI.
#[derive(Debug, Serialize)]
struct ViewerContext {
    is_creator: bool,
    is_pending_approver: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_approval_id: Option<Uuid>,
    is_recipient: bool,
    acknowledged: bool,
}

#[derive(Serialize)]
struct MemoDetail {
    #[serde(flatten)]
    memo: MemoWithCreator,
    approvals: Vec<ApprovalView>,
    recipients: Vec<RecipientView>,
    attachments: Vec<Attachment>,
    viewer: ViewerContext,
}

/// POST /api/memos — create a draft or submit a memo into the chain.
async fn create_memo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateMemoRequest>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state
        .workflow
        .create_memo(session.user_id, body.memo, body.is_draft)
        .await
    {
        Ok(created) => (StatusCode::CREATED, Json(serde_json::json!(created))).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /api/memos/{id} — full detail plus the caller's relationship.
async fn memo_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let memo = match state.db.get_memo_with_creator(id).await {
        Ok(Some(memo)) => memo,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"error": "Memo not found"})),
            )
                .into_response();
        }
        Err(e) => return error_response(e.into()).into_response(),
    };

    let approvals = state.db.list_approvals(id).await.unwrap_or_default();
    let recipients = state.db.list_recipients(id).await.unwrap_or_default();
    let attachments = state.db.list_attachments(id).await.unwrap_or_default();

    let is_creator = memo.memo.created_by == session.user_id;
    // The current step is the first pending one with every earlier step
    // approved; the list is already ordered by step_order.
    let current = approvals.iter().enumerate().find(|(i, a)| {
        a.approval.status == ApprovalStatus::Pending
            && approvals[..*i]
                .iter()
                .all(|b| b.approval.status == ApprovalStatus::Approved)
    });
    let is_pending_approver = !is_creator
        && current
            .map(|(_, a)| a.approval.approver_id == session.user_id)
            .unwrap_or(false);
    let recipient_record = recipients
        .iter()
        .find(|r| r.recipient.recipient_id == session.user_id);

    let viewer = ViewerContext {
        is_creator,
        is_pending_approver,
        current_approval_id: if is_pending_approver {
            current.map(|(_, a)| a.approval.id)
        } else {
            None
        },
        is_recipient: !is_creator && recipient_record.is_some(),
        acknowledged: recipient_record
            .map(|r| r.recipient.acknowledged_at.is_some())
            .unwrap_or(false),
    };

    Json(MemoDetail {
        memo,
        approvals,
        recipients,
        attachments,
        viewer,
    })
    .into_response()
}

/// GET /api/memos/mine — memos created by the caller.
async fn my_memos(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state.db.list_memos_by_creator(session.user_id).await {
        Ok(memos) => Json(memos).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// GET /api/memos/inbox — distributed memos addressed to the caller.
async fn inbox(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state.db.list_inbox(session.user_id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// GET /api/approvals — memos where it is the caller's turn to decide.
async fn pending_approvals(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state.db.list_pending_approvals(session.user_id).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// POST /api/memos/{id}/approve
async fn approve(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<ApproveRequest>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state
        .workflow
        .approve_memo(session.user_id, id, body.approval_id)
        .await
    {
        Ok(new_status) => {
            Json(serde_json::json!({"success": true, "status": new_status})).into_response()
        }
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /api/memos/{id}/reject
async fn reject(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(body): Json<RejectRequest>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state
        .workflow
        .reject_memo(session.user_id, id, body.approval_id, body.comments)
        .await
    {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /api/memos/{id}/acknowledge
async fn acknowledge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state
        .workflow
        .acknowledge_memo(session.user_id, &session.username, id)
        .await
    {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// POST /api/memos/{id}/read
async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    match state.workflow.mark_read(session.user_id, id).await {
        Ok(()) => Json(serde_json::json!({"success": true})).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// GET /api/search?q= — scoped to memos the caller created, receives, or
/// approves. Terms under 3 characters return nothing.
async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let term = query.q.unwrap_or_default();
    if term.len() < 3 {
        return Json(serde_json::json!({"results": []})).into_response();
    }

    match state.db.search_memos(session.user_id, &term, 10).await {
        Ok(results) => Json(serde_json::json!({ "results": results })).into_response(),
        Err(e) => error_response(e.into()).into_response(),
    }
}

/// Build the memo routes.
pub fn memo_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/memos", post(create_memo))
        .route("/api/memos/mine", get(my_memos))
        .route("/api/memos/inbox", get(inbox))
        .route("/api/memos/{id}", get(memo_detail))
        .route("/api/memos/{id}/approve", post(approve))
        .route("/api/memos/{id}/reject", post(reject))
        .route("/api/memos/{id}/acknowledge", post(acknowledge))
        .route("/api/memos/{id}/read", post(mark_read))
        .route("/api/approvals", get(pending_approvals))
        .route("/api/search", get(search))
        .with_state(state)
}
