//! Reporting — dashboard metrics and the lifecycle report.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::http::AppState;
use crate::memos::model::MemoStatus;
use crate::users::model::role;

/// Personal counters shown on the dashboard landing page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardStats {
    /// Approval steps currently assigned to the user and pending.
    pub pending_approvals: i64,
    /// Memos distributed to the user and not yet acknowledged.
    pub unacknowledged: i64,
    /// Memos the user has created.
    pub my_memos: i64,
    /// University-wide distributed memo count.
    pub distributed_total: i64,
}

/// One month of memo volume.
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyCount {
    /// Display label, e.g. `Mar 2026`.
    pub label: String,
    pub count: i64,
}

/// Institution-wide totals for the reports page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportTotals {
    pub total_memos: i64,
    pub distributed_memos: i64,
    pub total_users: i64,
}

/// One row of the lifecycle report.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub id: Uuid,
    pub reference_number: String,
    pub title: String,
    pub status: MemoStatus,
    pub department: String,
    pub creator_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct DashboardResponse {
    #[serde(flatten)]
    stats: DashboardStats,
    monthly_activity: Vec<MonthlyCount>,
}

#[derive(Serialize)]
struct ReportResponse {
    #[serde(flatten)]
    totals: ReportTotals,
    memos: Vec<ReportRow>,
}

/// GET /api/dashboard — the caller's counters plus 12 months of activity.
async fn dashboard(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let session = match crate::auth::require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };

    let stats = match state.db.dashboard_stats(session.user_id).await {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!(error = %e, "dashboard stats query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to load dashboard"})),
            )
                .into_response();
        }
    };

    let monthly_activity = state.db.monthly_memo_counts(12).await.unwrap_or_default();

    Json(DashboardResponse {
        stats,
        monthly_activity,
    })
    .into_response()
}

/// GET /api/reports — totals and the full lifecycle list.
/// Restricted to Administrator and Reviewer.
async fn reports(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    let session = match crate::auth::require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response.into_response(),
    };
    if !session.has_role(role::ADMINISTRATOR) && !session.has_role(role::REVIEWER) {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "Reports require Administrator or Reviewer role"})),
        )
            .into_response();
    }

    let totals = match state.db.report_totals().await {
        Ok(totals) => totals,
        Err(e) => {
            tracing::error!(error = %e, "report totals query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to load report"})),
            )
                .into_response();
        }
    };
    let memos = state.db.list_memo_report().await.unwrap_or_default();

    Json(ReportResponse { totals, memos }).into_response()
}

/// Build the reporting routes.
pub fn report_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/dashboard", get(dashboard))
        .route("/api/reports", get(reports))
        .with_state(state)
}
