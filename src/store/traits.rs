//! Unified `Database` trait — single async interface for all persistence.
//!
//! Read methods are fine-grained; workflow mutations that touch several
//! tables (memo + recipients + approvals + notifications + audit) are
//! composite methods so the backend can run them in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::memos::model::{
    ApprovalStatus, Attachment, Memo, MemoApproval, MemoRecipient, MemoStatus, NewAttachment,
};
use crate::notify::{NewNotification, NotificationRecord};
use crate::reports::{DashboardStats, MonthlyCount, ReportRow, ReportTotals};
use crate::users::model::{
    DirectoryEntry, DuplicateUser, HrStaffRecord, UserRecord, UserSummary, UserUpdate,
};

/// One audit-trail row. `record_id` is kept textual so the trail survives
/// schema changes in the tables it points at.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: Uuid,
    pub action: String,
    pub table_name: String,
    pub record_id: String,
    pub new_value: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(
        user_id: Uuid,
        action: impl Into<String>,
        table_name: impl Into<String>,
        record_id: impl ToString,
    ) -> Self {
        Self {
            user_id,
            action: action.into(),
            table_name: table_name.into(),
            record_id: record_id.to_string(),
            new_value: None,
        }
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.new_value = Some(value);
        self
    }
}

/// One planned approval step, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApprovalStep {
    pub approver_id: Uuid,
    pub step_order: i64,
}

/// Everything written when a memo is created: the memo row, attachment
/// metadata, recipients, the planned approval chain, the first-approver
/// notification, and the audit row. Applied atomically.
#[derive(Debug, Clone)]
pub struct MemoBundle {
    pub memo: Memo,
    pub attachments: Vec<NewAttachment>,
    pub recipients: Vec<Uuid>,
    pub approvals: Vec<NewApprovalStep>,
    pub notifications: Vec<NewNotification>,
    pub audit: AuditEntry,
}

/// Everything written when an approval step is decided. Applied atomically.
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    pub memo_id: Uuid,
    pub approval_id: Uuid,
    pub status: ApprovalStatus,
    pub comments: Option<String>,
    pub new_memo_status: MemoStatus,
    pub notifications: Vec<NewNotification>,
    pub audit: AuditEntry,
}

/// A memo joined with its creator's display fields.
#[derive(Debug, Clone, Serialize)]
pub struct MemoWithCreator {
    #[serde(flatten)]
    pub memo: Memo,
    pub creator_name: String,
    pub creator_email: String,
}

/// An approval step joined with the approver's name.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovalView {
    #[serde(flatten)]
    pub approval: MemoApproval,
    pub approver_name: String,
}

/// A recipient row joined with the recipient's name.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientView {
    #[serde(flatten)]
    pub recipient: MemoRecipient,
    pub recipient_name: String,
}

/// A distributed memo as seen from a recipient's inbox.
#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    #[serde(flatten)]
    pub memo: Memo,
    pub creator_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// A memo whose current step belongs to the queried approver.
#[derive(Debug, Clone, Serialize)]
pub struct PendingApprovalEntry {
    #[serde(flatten)]
    pub memo: Memo,
    pub creator_name: String,
    pub approval_id: Uuid,
    pub step_order: i64,
}

/// A scoped search result.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
    pub reference_number: String,
    pub status: MemoStatus,
}

/// Backend-agnostic database trait covering users, memos, the approval
/// chain, notifications, audit, and reporting.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a user with role assignments and an audit row, atomically.
    async fn insert_user(
        &self,
        user: &UserRecord,
        roles: &[String],
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError>;

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError>;

    async fn get_user_by_staff_id(
        &self,
        staff_id: &str,
    ) -> Result<Option<UserRecord>, DatabaseError>;

    /// Role names assigned to the user.
    async fn get_user_roles(&self, id: Uuid) -> Result<Vec<String>, DatabaseError>;

    /// Probe for an existing account with this staff id or email.
    async fn find_duplicate_user(
        &self,
        staff_id: &str,
        email: &str,
    ) -> Result<Option<DuplicateUser>, DatabaseError>;

    /// Admin directory listing with roles and resolved manager names.
    /// `filter` matches username, email, or staff id.
    async fn list_directory(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DatabaseError>;

    /// Update profile fields and replace role assignments, atomically.
    async fn update_user(
        &self,
        id: Uuid,
        update: &UserUpdate,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError>;

    async fn set_user_active(
        &self,
        id: Uuid,
        active: bool,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError>;

    /// Whether the user authored memos or signed approvals — such users
    /// must not be deleted, only deactivated.
    async fn user_has_records(&self, id: Uuid) -> Result<bool, DatabaseError>;

    /// Remove a user and their relational rows. Audit rows are reassigned
    /// to `audit.user_id` (the acting administrator) first. Atomic.
    async fn delete_user(&self, id: Uuid, audit: &AuditEntry) -> Result<(), DatabaseError>;

    async fn list_users_with_role(&self, role: &str) -> Result<Vec<UserSummary>, DatabaseError>;

    async fn list_active_users(&self) -> Result<Vec<UserSummary>, DatabaseError>;

    async fn update_password(
        &self,
        id: Uuid,
        new_hash: &str,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError>;

    // ── HR feed ─────────────────────────────────────────────────────

    async fn get_hr_staff(&self, staff_id: &str) -> Result<Option<HrStaffRecord>, DatabaseError>;

    async fn upsert_hr_staff(&self, record: &HrStaffRecord) -> Result<(), DatabaseError>;

    /// Search active HR staff by name, staff id, or email.
    async fn search_hr_staff(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<HrStaffRecord>, DatabaseError>;

    // ── Memos ───────────────────────────────────────────────────────

    /// Latest reference number matching a `LIKE` pattern, by creation order.
    async fn latest_reference_like(
        &self,
        pattern: &str,
    ) -> Result<Option<String>, DatabaseError>;

    /// Apply a creation bundle in one transaction.
    async fn insert_memo_bundle(&self, bundle: &MemoBundle) -> Result<(), DatabaseError>;

    async fn get_memo(&self, id: Uuid) -> Result<Option<Memo>, DatabaseError>;

    async fn get_memo_with_creator(
        &self,
        id: Uuid,
    ) -> Result<Option<MemoWithCreator>, DatabaseError>;

    /// Approval chain of a memo, ordered by `step_order`.
    async fn list_approvals(&self, memo_id: Uuid) -> Result<Vec<ApprovalView>, DatabaseError>;

    async fn list_recipients(&self, memo_id: Uuid) -> Result<Vec<RecipientView>, DatabaseError>;

    async fn list_attachments(&self, memo_id: Uuid) -> Result<Vec<Attachment>, DatabaseError>;

    async fn list_memos_by_creator(&self, user_id: Uuid) -> Result<Vec<Memo>, DatabaseError>;

    /// Distributed memos where the user is a recipient, newest first.
    async fn list_inbox(&self, user_id: Uuid) -> Result<Vec<InboxEntry>, DatabaseError>;

    /// Memos where it is currently the user's turn to approve: their step
    /// is pending and every earlier step is approved.
    async fn list_pending_approvals(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PendingApprovalEntry>, DatabaseError>;

    /// Apply an approve/reject decision in one transaction.
    async fn apply_approval_decision(
        &self,
        decision: &ApprovalDecision,
    ) -> Result<(), DatabaseError>;

    /// Stamp `acknowledged_at` for the (memo, recipient) pair and write the
    /// creator notification, atomically. Returns false when the user is not
    /// a recipient of the memo.
    async fn acknowledge_recipient(
        &self,
        memo_id: Uuid,
        recipient_id: Uuid,
        notification: &NewNotification,
    ) -> Result<bool, DatabaseError>;

    /// Stamp `read_at` once (only while it is still NULL). Returns whether
    /// a row was updated.
    async fn mark_recipient_read(
        &self,
        memo_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, DatabaseError>;

    /// Title/reference search over memos the user created, receives, or
    /// approves.
    async fn search_memos(
        &self,
        user_id: Uuid,
        term: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, DatabaseError>;

    /// Archive distributed memos whose expiry date has passed. Returns the
    /// number archived.
    async fn archive_expired_memos(&self) -> Result<usize, DatabaseError>;

    // ── Notifications ───────────────────────────────────────────────

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, DatabaseError>;

    /// Mark one of the user's notifications read. Returns whether a row
    /// was updated.
    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DatabaseError>;

    // ── Audit ───────────────────────────────────────────────────────

    async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError>;

    // ── Reports ─────────────────────────────────────────────────────

    async fn dashboard_stats(&self, user_id: Uuid) -> Result<DashboardStats, DatabaseError>;

    /// Memo counts per month for the trailing `months` months.
    async fn monthly_memo_counts(&self, months: u32) -> Result<Vec<MonthlyCount>, DatabaseError>;

    async fn report_totals(&self) -> Result<ReportTotals, DatabaseError>;

    async fn list_memo_report(&self) -> Result<Vec<ReportRow>, DatabaseError>;
}
