//! Persistence layer — libSQL-backed storage for the memo portal.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{
    ApprovalDecision, ApprovalView, AuditEntry, Database, InboxEntry, MemoBundle, MemoWithCreator,
    NewApprovalStep, PendingApprovalEntry, RecipientView, SearchHit,
};
