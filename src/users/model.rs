//! User directory data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role names with workflow meaning. Stored as plain strings in the
/// `roles` table; these constants keep the spelling in one place.
pub mod role {
    pub const STAFF: &str = "Staff";
    pub const LINE_MANAGER: &str = "Line Manager";
    pub const REVIEWER: &str = "Reviewer";
    pub const ADMINISTRATOR: &str = "Administrator";
}

/// A portal account, as stored. `password_hash` never leaves the store
/// and auth layers.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub staff_id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub department: String,
    pub line_manager_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slim user view used by pickers (managers, recipients).
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub department: String,
}

/// One row of the admin user directory.
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryEntry {
    pub id: Uuid,
    pub staff_id: String,
    pub username: String,
    pub email: String,
    pub department: String,
    pub is_active: bool,
    pub line_manager_id: Option<Uuid>,
    /// Explicitly assigned manager name, falling back to the HR feed.
    pub manager_name: Option<String>,
    pub roles: Vec<String>,
}

/// Result of the duplicate-account probe.
#[derive(Debug, Clone, Serialize)]
pub struct DuplicateUser {
    pub id: Uuid,
    pub username: String,
    pub is_active: bool,
    pub roles: Vec<String>,
}

/// Mirror row of the external HR staff feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrStaffRecord {
    pub staff_id: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: Option<String>,
    pub surname: String,
    pub official_email: String,
    pub department_code: String,
    #[serde(default)]
    pub line_manager_staff_id: Option<String>,
    pub is_active: bool,
}

/// Fields accepted when an administrator creates an account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub staff_id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub department: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub line_manager_id: Option<Uuid>,
}

/// Fields accepted when an administrator updates an account.
#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub username: String,
    pub email: String,
    pub department: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub line_manager_id: Option<Uuid>,
}

fn default_active() -> bool {
    true
}
