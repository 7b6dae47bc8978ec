//! Memo data model — the record types routed through the approval chain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a memo.
///
/// Serialized (API and database) with the institutional labels, spaces
/// included, so existing exports stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoStatus {
    Draft,
    #[serde(rename = "Line Manager Review")]
    LineManagerReview,
    #[serde(rename = "Reviewer Approval")]
    ReviewerApproval,
    Distributed,
    Archived,
}

impl MemoStatus {
    /// Database string for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoStatus::Draft => "Draft",
            MemoStatus::LineManagerReview => "Line Manager Review",
            MemoStatus::ReviewerApproval => "Reviewer Approval",
            MemoStatus::Distributed => "Distributed",
            MemoStatus::Archived => "Archived",
        }
    }

    /// Parse a database string. Unknown values fall back to `Draft`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "Line Manager Review" => MemoStatus::LineManagerReview,
            "Reviewer Approval" => MemoStatus::ReviewerApproval,
            "Distributed" => MemoStatus::Distributed,
            "Archived" => MemoStatus::Archived,
            _ => MemoStatus::Draft,
        }
    }
}

/// Urgency of a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoPriority {
    Low,
    Medium,
    High,
}

impl MemoPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoPriority::Low => "Low",
            MemoPriority::Medium => "Medium",
            MemoPriority::High => "High",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "Low" => MemoPriority::Low,
            "High" => MemoPriority::High,
            _ => MemoPriority::Medium,
        }
    }
}

/// What kind of communication the memo is. `Approval` memos always require
/// a final reviewer sign-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoType {
    Informational,
    Approval,
    Action,
}

impl MemoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoType::Informational => "Informational",
            MemoType::Approval => "Approval",
            MemoType::Action => "Action",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "Approval" => MemoType::Approval,
            "Action" => MemoType::Action,
            _ => MemoType::Informational,
        }
    }
}

/// Decision state of one approval step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Rejected => "Rejected",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "Approved" => ApprovalStatus::Approved,
            "Rejected" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Pending,
        }
    }
}

/// An institutional communication record routed through approval before
/// distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memo {
    pub id: Uuid,
    pub reference_number: String,
    pub title: String,
    pub content: String,
    pub department: String,
    pub category: String,
    pub priority: MemoPriority,
    pub memo_type: MemoType,
    pub status: MemoStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One required sign-off, ordered by `step_order` within its memo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoApproval {
    pub id: Uuid,
    pub memo_id: Uuid,
    pub approver_id: Uuid,
    pub step_order: i64,
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Delivery record for one recipient of a memo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoRecipient {
    pub memo_id: Uuid,
    pub recipient_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
}

/// Attachment metadata. The file bytes live outside the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub id: Uuid,
    pub memo_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Attachment metadata supplied at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAttachment {
    pub file_name: String,
    pub file_path: String,
    pub file_type: String,
    pub file_size: i64,
}

/// Fields accepted when drafting or submitting a memo.
#[derive(Debug, Clone, Deserialize)]
pub struct NewMemo {
    pub title: String,
    pub content: String,
    pub department: String,
    pub category: String,
    #[serde(default)]
    pub priority: Option<MemoPriority>,
    pub memo_type: MemoType,
    #[serde(default)]
    pub expiry_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recipient_ids: Vec<Uuid>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_db_strings() {
        for status in [
            MemoStatus::Draft,
            MemoStatus::LineManagerReview,
            MemoStatus::ReviewerApproval,
            MemoStatus::Distributed,
            MemoStatus::Archived,
        ] {
            assert_eq!(MemoStatus::from_db(status.as_str()), status);
        }
    }

    #[test]
    fn status_serializes_with_institutional_labels() {
        let json = serde_json::to_string(&MemoStatus::LineManagerReview).unwrap();
        assert_eq!(json, "\"Line Manager Review\"");
        let back: MemoStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MemoStatus::LineManagerReview);
    }

    #[test]
    fn unknown_db_strings_fall_back() {
        assert_eq!(MemoStatus::from_db("garbage"), MemoStatus::Draft);
        assert_eq!(MemoPriority::from_db(""), MemoPriority::Medium);
        assert_eq!(ApprovalStatus::from_db("???"), ApprovalStatus::Pending);
    }
}
