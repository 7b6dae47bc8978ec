//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Composite workflow writes
//! run inside a transaction; an uncommitted transaction rolls back on drop.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::memos::model::{
    ApprovalStatus, Attachment, Memo, MemoApproval, MemoPriority, MemoRecipient, MemoStatus,
    MemoType,
};
use crate::notify::{NewNotification, NotificationRecord};
use crate::reports::{DashboardStats, MonthlyCount, ReportRow, ReportTotals};
use crate::store::migrations;
use crate::store::traits::{
    ApprovalDecision, ApprovalView, AuditEntry, Database, InboxEntry, MemoBundle, MemoWithCreator,
    PendingApprovalEntry, RecipientView, SearchHit,
};
use crate::users::model::{
    DirectoryEntry, DuplicateUser, HrStaffRecord, UserRecord, UserSummary, UserUpdate,
};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn parse_optional_datetime(s: &Option<String>) -> Option<DateTime<Utc>> {
    s.as_ref().map(|s| parse_datetime(s))
}

/// Convert `Option<&str>` to a libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

fn opt_uuid(id: Option<Uuid>) -> libsql::Value {
    match id {
        Some(id) => libsql::Value::Text(id.to_string()),
        None => libsql::Value::Null,
    }
}

fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).unwrap_or_else(|_| Uuid::nil())
}

const USER_COLUMNS: &str =
    "id, staff_id, username, email, password_hash, department, line_manager_id, is_active, created_at, updated_at";

const MEMO_COLUMNS: &str = "id, reference_number, title, content, department, category, priority, memo_type, status, expiry_date, created_by, created_at, updated_at";

const MEMO_COLUMNS_M: &str = "m.id, m.reference_number, m.title, m.content, m.department, m.category, m.priority, m.memo_type, m.status, m.expiry_date, m.created_by, m.created_at, m.updated_at";

const HR_COLUMNS: &str = "staff_id, first_name, middle_name, surname, official_email, department_code, line_manager_staff_id, is_active";

/// Map a libsql Row to a UserRecord. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<UserRecord, libsql::Error> {
    let id_str: String = row.get(0)?;
    let manager_str: Option<String> = row.get(6).ok();
    let is_active: i64 = row.get(7)?;
    let created_str: String = row.get(8)?;
    let updated_str: String = row.get(9)?;

    Ok(UserRecord {
        id: parse_uuid(&id_str),
        staff_id: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        department: row.get(5)?,
        line_manager_id: manager_str.as_deref().map(parse_uuid),
        is_active: is_active != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Memo. Column order matches MEMO_COLUMNS.
fn row_to_memo(row: &libsql::Row) -> Result<Memo, libsql::Error> {
    let id_str: String = row.get(0)?;
    let priority_str: String = row.get(6)?;
    let type_str: String = row.get(7)?;
    let status_str: String = row.get(8)?;
    let expiry_str: Option<String> = row.get(9).ok();
    let created_by_str: String = row.get(10)?;
    let created_str: String = row.get(11)?;
    let updated_str: String = row.get(12)?;

    Ok(Memo {
        id: parse_uuid(&id_str),
        reference_number: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        department: row.get(4)?,
        category: row.get(5)?,
        priority: MemoPriority::from_db(&priority_str),
        memo_type: MemoType::from_db(&type_str),
        status: MemoStatus::from_db(&status_str),
        expiry_date: parse_optional_datetime(&expiry_str),
        created_by: parse_uuid(&created_by_str),
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to an HrStaffRecord. Column order matches HR_COLUMNS.
fn row_to_hr_staff(row: &libsql::Row) -> Result<HrStaffRecord, libsql::Error> {
    let is_active: i64 = row.get(7)?;
    Ok(HrStaffRecord {
        staff_id: row.get(0)?,
        first_name: row.get(1)?,
        middle_name: row.get(2).ok(),
        surname: row.get(3)?,
        official_email: row.get(4)?,
        department_code: row.get(5)?,
        line_manager_staff_id: row.get(6).ok(),
        is_active: is_active != 0,
    })
}

fn split_roles(concat: Option<String>) -> Vec<String> {
    concat
        .map(|s| {
            s.split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Insert one audit row on the given connection (plain or transaction).
async fn insert_audit_on(conn: &Connection, entry: &AuditEntry) -> Result<(), DatabaseError> {
    let value_str = match &entry.new_value {
        Some(v) => Some(
            serde_json::to_string(v).map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        ),
        None => None,
    };
    conn.execute(
        "INSERT INTO audit_logs (id, user_id, action, table_name, record_id, new_value, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            Uuid::new_v4().to_string(),
            entry.user_id.to_string(),
            entry.action.clone(),
            entry.table_name.clone(),
            entry.record_id.clone(),
            opt_text_owned(value_str),
            Utc::now().to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert_audit: {e}")))?;
    Ok(())
}

/// Insert one notification row on the given connection.
async fn insert_notification_on(
    conn: &Connection,
    notification: &NewNotification,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO notifications (id, user_id, memo_id, message, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![
            Uuid::new_v4().to_string(),
            notification.user_id.to_string(),
            opt_uuid(notification.memo_id),
            notification.message.clone(),
            Utc::now().to_rfc3339(),
        ],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("insert_notification: {e}")))?;
    Ok(())
}

/// Replace a user's role assignments on the given connection.
async fn replace_roles_on(
    conn: &Connection,
    user_id: Uuid,
    roles: &[String],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM user_roles WHERE user_id = ?1",
        params![user_id.to_string()],
    )
    .await
    .map_err(|e| DatabaseError::Query(format!("replace_roles delete: {e}")))?;

    for role in roles {
        conn.execute(
            "INSERT INTO user_roles (user_id, role_id)
             SELECT ?1, id FROM roles WHERE name = ?2",
            params![user_id.to_string(), role.clone()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("replace_roles insert: {e}")))?;
    }
    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(
        &self,
        user: &UserRecord,
        roles: &[String],
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("insert_user begin: {e}")))?;

        tx.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                user.id.to_string(),
                user.staff_id.clone(),
                user.username.clone(),
                user.email.clone(),
                user.password_hash.clone(),
                user.department.clone(),
                opt_uuid(user.line_manager_id),
                user.is_active as i64,
                user.created_at.to_rfc3339(),
                user.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                DatabaseError::Constraint(format!("insert_user: {e}"))
            } else {
                DatabaseError::Query(format!("insert_user: {e}"))
            }
        })?;

        replace_roles_on(&tx, user.id, roles).await?;
        insert_audit_on(&tx, audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("insert_user commit: {e}")))?;

        debug!(user_id = %user.id, "User created");
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_user row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row).map_err(|e| {
                DatabaseError::Query(format!("get_user_by_email row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_by_email: {e}"))),
        }
    }

    async fn get_user_by_staff_id(
        &self,
        staff_id: &str,
    ) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE staff_id = ?1"),
                params![staff_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_by_staff_id: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_user(&row).map_err(|e| {
                DatabaseError::Query(format!("get_user_by_staff_id row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_by_staff_id: {e}"))),
        }
    }

    async fn get_user_roles(&self, id: Uuid) -> Result<Vec<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT r.name FROM roles r
                 JOIN user_roles ur ON r.id = ur.role_id
                 WHERE ur.user_id = ?1
                 ORDER BY r.name",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_roles: {e}")))?;

        let mut roles = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let name: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("get_user_roles row parse: {e}")))?;
            roles.push(name);
        }
        Ok(roles)
    }

    async fn find_duplicate_user(
        &self,
        staff_id: &str,
        email: &str,
    ) -> Result<Option<DuplicateUser>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT u.id, u.username, u.is_active, GROUP_CONCAT(r.name) AS roles_list
                 FROM users u
                 LEFT JOIN user_roles ur ON u.id = ur.user_id
                 LEFT JOIN roles r ON ur.role_id = r.id
                 WHERE u.staff_id = ?1 OR u.email = ?2
                 GROUP BY u.id
                 LIMIT 1",
                params![staff_id, email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("find_duplicate_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let id_str: String = row.get(0).unwrap_or_default();
                let username: String = row.get(1).unwrap_or_default();
                let is_active: i64 = row.get(2).unwrap_or(0);
                let roles_list: Option<String> = row.get(3).ok();
                Ok(Some(DuplicateUser {
                    id: parse_uuid(&id_str),
                    username,
                    is_active: is_active != 0,
                    roles: split_roles(roles_list),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("find_duplicate_user: {e}"))),
        }
    }

    async fn list_directory(
        &self,
        filter: Option<&str>,
    ) -> Result<Vec<DirectoryEntry>, DatabaseError> {
        let pattern = filter.map(|q| format!("%{q}%"));
        let mut rows = self
            .conn()
            .query(
                "SELECT u.id, u.staff_id, u.username, u.email, u.department, u.is_active,
                        u.line_manager_id,
                        COALESCE(mgr.username, hr_mgr.username) AS manager_name,
                        GROUP_CONCAT(r.name) AS roles_list
                 FROM users u
                 LEFT JOIN users mgr ON u.line_manager_id = mgr.id
                 LEFT JOIN hr_staff hr ON u.staff_id = hr.staff_id
                 LEFT JOIN users hr_mgr ON hr.line_manager_staff_id = hr_mgr.staff_id
                 LEFT JOIN user_roles ur ON u.id = ur.user_id
                 LEFT JOIN roles r ON ur.role_id = r.id
                 WHERE (?1 IS NULL OR u.username LIKE ?1 OR u.email LIKE ?1 OR u.staff_id LIKE ?1)
                 GROUP BY u.id
                 ORDER BY u.created_at DESC",
                params![opt_text_owned(pattern)],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_directory: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let manager_id: Option<String> = row.get(6).ok();
            let is_active: i64 = row.get(5).unwrap_or(0);
            entries.push(DirectoryEntry {
                id: parse_uuid(&id_str),
                staff_id: row.get(1).unwrap_or_default(),
                username: row.get(2).unwrap_or_default(),
                email: row.get(3).unwrap_or_default(),
                department: row.get(4).unwrap_or_default(),
                is_active: is_active != 0,
                line_manager_id: manager_id.as_deref().map(parse_uuid),
                manager_name: row.get(7).ok(),
                roles: split_roles(row.get(8).ok()),
            });
        }
        Ok(entries)
    }

    async fn update_user(
        &self,
        id: Uuid,
        update: &UserUpdate,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("update_user begin: {e}")))?;

        tx.execute(
            "UPDATE users SET username = ?1, email = ?2, department = ?3, is_active = ?4,
                 line_manager_id = ?5, updated_at = ?6 WHERE id = ?7",
            params![
                update.username.clone(),
                update.email.clone(),
                update.department.clone(),
                update.is_active as i64,
                opt_uuid(update.line_manager_id),
                Utc::now().to_rfc3339(),
                id.to_string(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("update_user: {e}")))?;

        replace_roles_on(&tx, id, &update.roles).await?;
        insert_audit_on(&tx, audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("update_user commit: {e}")))?;
        Ok(())
    }

    async fn set_user_active(
        &self,
        id: Uuid,
        active: bool,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("set_user_active begin: {e}")))?;

        tx.execute(
            "UPDATE users SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active as i64, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("set_user_active: {e}")))?;

        insert_audit_on(&tx, audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("set_user_active commit: {e}")))?;
        Ok(())
    }

    async fn user_has_records(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT EXISTS (SELECT 1 FROM memos WHERE created_by = ?1)
                     OR EXISTS (SELECT 1 FROM memo_approvals WHERE approver_id = ?1)",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("user_has_records: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let flag: i64 = row.get(0).unwrap_or(0);
                Ok(flag != 0)
            }
            _ => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid, audit: &AuditEntry) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("delete_user begin: {e}")))?;

        // Reassign audit rows to the acting admin before the FK row goes away.
        tx.execute(
            "UPDATE audit_logs SET user_id = ?1 WHERE user_id = ?2",
            params![audit.user_id.to_string(), id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_user audit reassign: {e}")))?;

        for sql in [
            "DELETE FROM user_roles WHERE user_id = ?1",
            "DELETE FROM memo_recipients WHERE recipient_id = ?1",
            "DELETE FROM notifications WHERE user_id = ?1",
            "DELETE FROM users WHERE id = ?1",
        ] {
            tx.execute(sql, params![id.to_string()])
                .await
                .map_err(|e| DatabaseError::Query(format!("delete_user: {e}")))?;
        }

        insert_audit_on(&tx, audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("delete_user commit: {e}")))?;

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn list_users_with_role(&self, role: &str) -> Result<Vec<UserSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT u.id, u.username, u.department
                 FROM users u
                 JOIN user_roles ur ON u.id = ur.user_id
                 JOIN roles r ON ur.role_id = r.id
                 WHERE r.name = ?1
                 ORDER BY u.username",
                params![role],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users_with_role: {e}")))?;

        let mut users = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            users.push(UserSummary {
                id: parse_uuid(&id_str),
                username: row.get(1).unwrap_or_default(),
                department: row.get(2).unwrap_or_default(),
            });
        }
        Ok(users)
    }

    async fn list_active_users(&self) -> Result<Vec<UserSummary>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, username, department FROM users WHERE is_active = 1 ORDER BY username",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_users: {e}")))?;

        let mut users = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            users.push(UserSummary {
                id: parse_uuid(&id_str),
                username: row.get(1).unwrap_or_default(),
                department: row.get(2).unwrap_or_default(),
            });
        }
        Ok(users)
    }

    async fn update_password(
        &self,
        id: Uuid,
        new_hash: &str,
        audit: &AuditEntry,
    ) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("update_password begin: {e}")))?;

        tx.execute(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
            params![new_hash, Utc::now().to_rfc3339(), id.to_string()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("update_password: {e}")))?;

        insert_audit_on(&tx, audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("update_password commit: {e}")))?;
        Ok(())
    }

    // ── HR feed ─────────────────────────────────────────────────────

    async fn get_hr_staff(&self, staff_id: &str) -> Result<Option<HrStaffRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {HR_COLUMNS} FROM hr_staff WHERE staff_id = ?1"),
                params![staff_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_hr_staff: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_hr_staff(&row).map_err(|e| {
                DatabaseError::Query(format!("get_hr_staff row parse: {e}"))
            })?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_hr_staff: {e}"))),
        }
    }

    async fn upsert_hr_staff(&self, record: &HrStaffRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO hr_staff ({HR_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                     ON CONFLICT (staff_id) DO UPDATE SET
                        first_name = ?2, middle_name = ?3, surname = ?4, official_email = ?5,
                        department_code = ?6, line_manager_staff_id = ?7, is_active = ?8"
                ),
                params![
                    record.staff_id.clone(),
                    record.first_name.clone(),
                    opt_text(record.middle_name.as_deref()),
                    record.surname.clone(),
                    record.official_email.clone(),
                    record.department_code.clone(),
                    opt_text(record.line_manager_staff_id.as_deref()),
                    record.is_active as i64,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_hr_staff: {e}")))?;
        Ok(())
    }

    async fn search_hr_staff(
        &self,
        term: &str,
        limit: usize,
    ) -> Result<Vec<HrStaffRecord>, DatabaseError> {
        let pattern = format!("%{term}%");
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {HR_COLUMNS} FROM hr_staff
                     WHERE (first_name LIKE ?1 OR surname LIKE ?1 OR staff_id LIKE ?1
                            OR official_email LIKE ?1)
                       AND is_active = 1
                     LIMIT ?2"
                ),
                params![pattern, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_hr_staff: {e}")))?;

        let mut staff = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_hr_staff(&row) {
                Ok(record) => staff.push(record),
                Err(e) => tracing::warn!("Skipping hr_staff row: {e}"),
            }
        }
        Ok(staff)
    }

    // ── Memos ───────────────────────────────────────────────────────

    async fn latest_reference_like(
        &self,
        pattern: &str,
    ) -> Result<Option<String>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT reference_number FROM memos WHERE reference_number LIKE ?1
                 ORDER BY created_at DESC, reference_number DESC LIMIT 1",
                params![pattern],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("latest_reference_like: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get(0).ok()),
            _ => Ok(None),
        }
    }

    async fn insert_memo_bundle(&self, bundle: &MemoBundle) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("insert_memo_bundle begin: {e}")))?;

        let memo = &bundle.memo;
        tx.execute(
            &format!(
                "INSERT INTO memos ({MEMO_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                memo.id.to_string(),
                memo.reference_number.clone(),
                memo.title.clone(),
                memo.content.clone(),
                memo.department.clone(),
                memo.category.clone(),
                memo.priority.as_str(),
                memo.memo_type.as_str(),
                memo.status.as_str(),
                opt_text_owned(memo.expiry_date.map(|d| d.to_rfc3339())),
                memo.created_by.to_string(),
                memo.created_at.to_rfc3339(),
                memo.updated_at.to_rfc3339(),
            ],
        )
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE") {
                DatabaseError::Constraint(format!("insert_memo_bundle: {e}"))
            } else {
                DatabaseError::Query(format!("insert_memo_bundle memo: {e}"))
            }
        })?;

        for attachment in &bundle.attachments {
            tx.execute(
                "INSERT INTO attachments (id, memo_id, file_name, file_path, file_type, file_size, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    Uuid::new_v4().to_string(),
                    memo.id.to_string(),
                    attachment.file_name.clone(),
                    attachment.file_path.clone(),
                    attachment.file_type.clone(),
                    attachment.file_size,
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_memo_bundle attachment: {e}")))?;
        }

        for recipient_id in &bundle.recipients {
            tx.execute(
                "INSERT OR IGNORE INTO memo_recipients (memo_id, recipient_id) VALUES (?1, ?2)",
                params![memo.id.to_string(), recipient_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_memo_bundle recipient: {e}")))?;
        }

        for step in &bundle.approvals {
            tx.execute(
                "INSERT INTO memo_approvals (id, memo_id, approver_id, step_order, status)
                 VALUES (?1, ?2, ?3, ?4, 'Pending')",
                params![
                    Uuid::new_v4().to_string(),
                    memo.id.to_string(),
                    step.approver_id.to_string(),
                    step.step_order,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_memo_bundle approval: {e}")))?;
        }

        for notification in &bundle.notifications {
            insert_notification_on(&tx, notification).await?;
        }

        insert_audit_on(&tx, &bundle.audit).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("insert_memo_bundle commit: {e}")))?;

        debug!(memo_id = %memo.id, reference = %memo.reference_number, "Memo bundle inserted");
        Ok(())
    }

    async fn get_memo(&self, id: Uuid) -> Result<Option<Memo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {MEMO_COLUMNS} FROM memos WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_memo: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(
                row_to_memo(&row)
                    .map_err(|e| DatabaseError::Query(format!("get_memo row parse: {e}")))?,
            )),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_memo: {e}"))),
        }
    }

    async fn get_memo_with_creator(
        &self,
        id: Uuid,
    ) -> Result<Option<MemoWithCreator>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MEMO_COLUMNS_M}, u.username, u.email
                     FROM memos m
                     JOIN users u ON m.created_by = u.id
                     WHERE m.id = ?1"
                ),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_memo_with_creator: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let memo = row_to_memo(&row).map_err(|e| {
                    DatabaseError::Query(format!("get_memo_with_creator row parse: {e}"))
                })?;
                Ok(Some(MemoWithCreator {
                    memo,
                    creator_name: row.get(13).unwrap_or_default(),
                    creator_email: row.get(14).unwrap_or_default(),
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_memo_with_creator: {e}"))),
        }
    }

    async fn list_approvals(&self, memo_id: Uuid) -> Result<Vec<ApprovalView>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT a.id, a.memo_id, a.approver_id, a.step_order, a.status, a.comments,
                        a.processed_at, u.username
                 FROM memo_approvals a
                 JOIN users u ON a.approver_id = u.id
                 WHERE a.memo_id = ?1
                 ORDER BY a.step_order ASC",
                params![memo_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_approvals: {e}")))?;

        let mut approvals = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let memo_str: String = row.get(1).unwrap_or_default();
            let approver_str: String = row.get(2).unwrap_or_default();
            let status_str: String = row.get(4).unwrap_or_default();
            let processed_str: Option<String> = row.get(6).ok();
            approvals.push(ApprovalView {
                approval: MemoApproval {
                    id: parse_uuid(&id_str),
                    memo_id: parse_uuid(&memo_str),
                    approver_id: parse_uuid(&approver_str),
                    step_order: row.get(3).unwrap_or(0),
                    status: ApprovalStatus::from_db(&status_str),
                    comments: row.get(5).ok(),
                    processed_at: parse_optional_datetime(&processed_str),
                },
                approver_name: row.get(7).unwrap_or_default(),
            });
        }
        Ok(approvals)
    }

    async fn list_recipients(&self, memo_id: Uuid) -> Result<Vec<RecipientView>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT mr.memo_id, mr.recipient_id, mr.read_at, mr.acknowledged_at, u.username
                 FROM memo_recipients mr
                 JOIN users u ON mr.recipient_id = u.id
                 WHERE mr.memo_id = ?1
                 ORDER BY u.username",
                params![memo_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_recipients: {e}")))?;

        let mut recipients = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let memo_str: String = row.get(0).unwrap_or_default();
            let recipient_str: String = row.get(1).unwrap_or_default();
            let read_str: Option<String> = row.get(2).ok();
            let ack_str: Option<String> = row.get(3).ok();
            recipients.push(RecipientView {
                recipient: MemoRecipient {
                    memo_id: parse_uuid(&memo_str),
                    recipient_id: parse_uuid(&recipient_str),
                    read_at: parse_optional_datetime(&read_str),
                    acknowledged_at: parse_optional_datetime(&ack_str),
                },
                recipient_name: row.get(4).unwrap_or_default(),
            });
        }
        Ok(recipients)
    }

    async fn list_attachments(&self, memo_id: Uuid) -> Result<Vec<Attachment>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, memo_id, file_name, file_path, file_type, file_size, uploaded_at
                 FROM attachments WHERE memo_id = ?1 ORDER BY uploaded_at ASC",
                params![memo_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_attachments: {e}")))?;

        let mut attachments = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let memo_str: String = row.get(1).unwrap_or_default();
            let uploaded_str: String = row.get(6).unwrap_or_default();
            attachments.push(Attachment {
                id: parse_uuid(&id_str),
                memo_id: parse_uuid(&memo_str),
                file_name: row.get(2).unwrap_or_default(),
                file_path: row.get(3).unwrap_or_default(),
                file_type: row.get(4).unwrap_or_default(),
                file_size: row.get(5).unwrap_or(0),
                uploaded_at: parse_datetime(&uploaded_str),
            });
        }
        Ok(attachments)
    }

    async fn list_memos_by_creator(&self, user_id: Uuid) -> Result<Vec<Memo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MEMO_COLUMNS} FROM memos WHERE created_by = ?1
                     ORDER BY created_at DESC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_memos_by_creator: {e}")))?;

        let mut memos = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_memo(&row) {
                Ok(memo) => memos.push(memo),
                Err(e) => tracing::warn!("Skipping memo row: {e}"),
            }
        }
        Ok(memos)
    }

    async fn list_inbox(&self, user_id: Uuid) -> Result<Vec<InboxEntry>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MEMO_COLUMNS_M}, u.username, mr.read_at, mr.acknowledged_at
                     FROM memos m
                     JOIN memo_recipients mr ON m.id = mr.memo_id
                     JOIN users u ON m.created_by = u.id
                     WHERE mr.recipient_id = ?1 AND m.status = 'Distributed'
                     ORDER BY m.created_at DESC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_inbox: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let memo = match row_to_memo(&row) {
                Ok(memo) => memo,
                Err(e) => {
                    tracing::warn!("Skipping inbox row: {e}");
                    continue;
                }
            };
            let read_str: Option<String> = row.get(14).ok();
            let ack_str: Option<String> = row.get(15).ok();
            entries.push(InboxEntry {
                memo,
                creator_name: row.get(13).unwrap_or_default(),
                read_at: parse_optional_datetime(&read_str),
                acknowledged_at: parse_optional_datetime(&ack_str),
            });
        }
        Ok(entries)
    }

    async fn list_pending_approvals(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<PendingApprovalEntry>, DatabaseError> {
        // Only memos where it is currently this approver's turn: their step
        // is pending and no earlier step is anything but approved.
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {MEMO_COLUMNS_M}, u.username, a.id, a.step_order
                     FROM memos m
                     JOIN memo_approvals a ON m.id = a.memo_id
                     JOIN users u ON m.created_by = u.id
                     WHERE a.approver_id = ?1
                       AND a.status = 'Pending'
                       AND NOT EXISTS (
                           SELECT 1 FROM memo_approvals a2
                           WHERE a2.memo_id = m.id
                             AND a2.step_order < a.step_order
                             AND a2.status != 'Approved'
                       )
                     ORDER BY m.created_at DESC"
                ),
                params![user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_pending_approvals: {e}")))?;

        let mut entries = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let memo = match row_to_memo(&row) {
                Ok(memo) => memo,
                Err(e) => {
                    tracing::warn!("Skipping pending approval row: {e}");
                    continue;
                }
            };
            let approval_str: String = row.get(14).unwrap_or_default();
            entries.push(PendingApprovalEntry {
                memo,
                creator_name: row.get(13).unwrap_or_default(),
                approval_id: parse_uuid(&approval_str),
                step_order: row.get(15).unwrap_or(0),
            });
        }
        Ok(entries)
    }

    async fn apply_approval_decision(
        &self,
        decision: &ApprovalDecision,
    ) -> Result<(), DatabaseError> {
        let tx = self.conn().transaction().await.map_err(|e| {
            DatabaseError::Transaction(format!("apply_approval_decision begin: {e}"))
        })?;

        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE memo_approvals SET status = ?1, comments = ?2, processed_at = ?3 WHERE id = ?4",
            params![
                decision.status.as_str(),
                opt_text(decision.comments.as_deref()),
                now.clone(),
                decision.approval_id.to_string(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("apply_approval_decision step: {e}")))?;

        tx.execute(
            "UPDATE memos SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                decision.new_memo_status.as_str(),
                now,
                decision.memo_id.to_string(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("apply_approval_decision memo: {e}")))?;

        for notification in &decision.notifications {
            insert_notification_on(&tx, notification).await?;
        }

        insert_audit_on(&tx, &decision.audit).await?;

        tx.commit().await.map_err(|e| {
            DatabaseError::Transaction(format!("apply_approval_decision commit: {e}"))
        })?;

        debug!(
            memo_id = %decision.memo_id,
            approval_id = %decision.approval_id,
            decision = decision.status.as_str(),
            new_status = decision.new_memo_status.as_str(),
            "Approval decision applied"
        );
        Ok(())
    }

    async fn acknowledge_recipient(
        &self,
        memo_id: Uuid,
        recipient_id: Uuid,
        notification: &NewNotification,
    ) -> Result<bool, DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("acknowledge begin: {e}")))?;

        let updated = tx
            .execute(
                "UPDATE memo_recipients SET acknowledged_at = ?1
                 WHERE memo_id = ?2 AND recipient_id = ?3",
                params![
                    Utc::now().to_rfc3339(),
                    memo_id.to_string(),
                    recipient_id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("acknowledge_recipient: {e}")))?;

        if updated == 0 {
            // Not a recipient — nothing to acknowledge, nothing to notify.
            return Ok(false);
        }

        insert_notification_on(&tx, notification).await?;

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Transaction(format!("acknowledge commit: {e}")))?;
        Ok(true)
    }

    async fn mark_recipient_read(
        &self,
        memo_id: Uuid,
        recipient_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE memo_recipients SET read_at = ?1
                 WHERE memo_id = ?2 AND recipient_id = ?3 AND read_at IS NULL",
                params![
                    Utc::now().to_rfc3339(),
                    memo_id.to_string(),
                    recipient_id.to_string(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_recipient_read: {e}")))?;
        Ok(updated > 0)
    }

    async fn search_memos(
        &self,
        user_id: Uuid,
        term: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, DatabaseError> {
        let pattern = format!("%{term}%");
        let uid = user_id.to_string();
        let mut rows = self
            .conn()
            .query(
                "SELECT DISTINCT m.id, m.title, m.reference_number, m.status
                 FROM memos m
                 LEFT JOIN memo_recipients mr ON m.id = mr.memo_id
                 LEFT JOIN memo_approvals ma ON m.id = ma.memo_id
                 WHERE (m.title LIKE ?1 OR m.reference_number LIKE ?1)
                   AND (m.created_by = ?2 OR mr.recipient_id = ?2 OR ma.approver_id = ?2)
                 LIMIT ?3",
                params![pattern, uid, limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("search_memos: {e}")))?;

        let mut hits = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let status_str: String = row.get(3).unwrap_or_default();
            hits.push(SearchHit {
                id: parse_uuid(&id_str),
                title: row.get(1).unwrap_or_default(),
                reference_number: row.get(2).unwrap_or_default(),
                status: MemoStatus::from_db(&status_str),
            });
        }
        Ok(hits)
    }

    async fn archive_expired_memos(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE memos SET status = 'Archived', updated_at = ?1
                 WHERE status = 'Distributed' AND expiry_date IS NOT NULL AND expiry_date <= ?1",
                params![now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("archive_expired_memos: {e}")))?;

        if count > 0 {
            info!(count, "Archived expired memos");
        }
        Ok(count as usize)
    }

    // ── Notifications ───────────────────────────────────────────────

    async fn list_notifications(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT id, user_id, memo_id, message, is_read, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2",
                params![user_id.to_string(), limit as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_notifications: {e}")))?;

        let mut notifications = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let user_str: String = row.get(1).unwrap_or_default();
            let memo_str: Option<String> = row.get(2).ok();
            let is_read: i64 = row.get(4).unwrap_or(0);
            let created_str: String = row.get(5).unwrap_or_default();
            notifications.push(NotificationRecord {
                id: parse_uuid(&id_str),
                user_id: parse_uuid(&user_str),
                memo_id: memo_str.as_deref().map(parse_uuid),
                message: row.get(3).unwrap_or_default(),
                is_read: is_read != 0,
                created_at: parse_datetime(&created_str),
            });
        }
        Ok(notifications)
    }

    async fn mark_notification_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, DatabaseError> {
        let updated = self
            .conn()
            .execute(
                "UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("mark_notification_read: {e}")))?;
        Ok(updated > 0)
    }

    // ── Audit ───────────────────────────────────────────────────────

    async fn insert_audit(&self, entry: &AuditEntry) -> Result<(), DatabaseError> {
        insert_audit_on(self.conn(), entry).await
    }

    // ── Reports ─────────────────────────────────────────────────────

    async fn dashboard_stats(&self, user_id: Uuid) -> Result<DashboardStats, DatabaseError> {
        let uid = user_id.to_string();
        let mut rows = self
            .conn()
            .query(
                "SELECT
                    (SELECT COUNT(*) FROM memo_approvals WHERE approver_id = ?1 AND status = 'Pending'),
                    (SELECT COUNT(*) FROM memo_recipients WHERE recipient_id = ?1 AND acknowledged_at IS NULL),
                    (SELECT COUNT(*) FROM memos WHERE created_by = ?1),
                    (SELECT COUNT(*) FROM memos WHERE status = 'Distributed')",
                params![uid],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("dashboard_stats: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(DashboardStats {
                pending_approvals: row.get(0).unwrap_or(0),
                unacknowledged: row.get(1).unwrap_or(0),
                my_memos: row.get(2).unwrap_or(0),
                distributed_total: row.get(3).unwrap_or(0),
            }),
            _ => Ok(DashboardStats::default()),
        }
    }

    async fn monthly_memo_counts(&self, months: u32) -> Result<Vec<MonthlyCount>, DatabaseError> {
        let cutoff = Utc::now()
            .checked_sub_months(chrono::Months::new(months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut rows = self
            .conn()
            .query(
                "SELECT strftime('%Y-%m', created_at) AS ym, COUNT(*)
                 FROM memos
                 WHERE created_at >= ?1
                 GROUP BY ym
                 ORDER BY ym ASC",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("monthly_memo_counts: {e}")))?;

        let mut counts = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let ym: String = row.get(0).unwrap_or_default();
            let count: i64 = row.get(1).unwrap_or(0);
            counts.push(MonthlyCount {
                label: month_label(&ym),
                count,
            });
        }
        Ok(counts)
    }

    async fn report_totals(&self) -> Result<ReportTotals, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT
                    (SELECT COUNT(*) FROM memos),
                    (SELECT COUNT(*) FROM memos WHERE status = 'Distributed'),
                    (SELECT COUNT(*) FROM users)",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("report_totals: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(ReportTotals {
                total_memos: row.get(0).unwrap_or(0),
                distributed_memos: row.get(1).unwrap_or(0),
                total_users: row.get(2).unwrap_or(0),
            }),
            _ => Ok(ReportTotals::default()),
        }
    }

    async fn list_memo_report(&self) -> Result<Vec<ReportRow>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT m.id, m.reference_number, m.title, m.status, m.department,
                        m.created_at, u.username
                 FROM memos m
                 JOIN users u ON m.created_by = u.id
                 ORDER BY m.created_at DESC",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_memo_report: {e}")))?;

        let mut report = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let id_str: String = row.get(0).unwrap_or_default();
            let status_str: String = row.get(3).unwrap_or_default();
            let created_str: String = row.get(5).unwrap_or_default();
            report.push(ReportRow {
                id: parse_uuid(&id_str),
                reference_number: row.get(1).unwrap_or_default(),
                title: row.get(2).unwrap_or_default(),
                status: MemoStatus::from_db(&status_str),
                department: row.get(4).unwrap_or_default(),
                created_at: parse_datetime(&created_str),
                creator_name: row.get(6).unwrap_or_default(),
            });
        }
        Ok(report)
    }
}

/// Render a `YYYY-MM` bucket as the `Mon YYYY` label the dashboard shows.
fn month_label(ym: &str) -> String {
    match chrono::NaiveDate::parse_from_str(&format!("{ym}-01"), "%Y-%m-%d") {
        Ok(date) => date.format("%b %Y").to_string(),
        Err(_) => ym.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_parsing_accepts_both_formats() {
        let rfc = parse_datetime("2026-03-01T10:30:00+00:00");
        assert_eq!(rfc.to_rfc3339(), "2026-03-01T10:30:00+00:00");

        let sqlite = parse_datetime("2026-03-01 10:30:00");
        assert_eq!(sqlite, rfc);
    }

    #[test]
    fn month_label_renders_short_month() {
        assert_eq!(month_label("2026-03"), "Mar 2026");
        assert_eq!(month_label("bogus"), "bogus");
    }

    #[tokio::test]
    async fn memory_backend_opens_and_migrates() {
        let backend = LibSqlBackend::new_memory().await.unwrap();
        // Second run is a no-op.
        backend.run_migrations().await.unwrap();
    }

    #[tokio::test]
    async fn local_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memoflow.db");

        {
            let backend = LibSqlBackend::new_local(&path).await.unwrap();
            backend
                .upsert_hr_staff(&HrStaffRecord {
                    staff_id: "CU-0009".into(),
                    first_name: "Halima".into(),
                    middle_name: None,
                    surname: "Bello".into(),
                    official_email: "halima@example.edu".into(),
                    department_code: "REG".into(),
                    line_manager_staff_id: None,
                    is_active: true,
                })
                .await
                .unwrap();
        }

        let backend = LibSqlBackend::new_local(&path).await.unwrap();
        let record = backend.get_hr_staff("CU-0009").await.unwrap().unwrap();
        assert_eq!(record.surname, "Bello");
    }
}
