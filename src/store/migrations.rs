//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                staff_id TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                department TEXT NOT NULL,
                line_manager_id TEXT REFERENCES users(id),
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);
            CREATE INDEX IF NOT EXISTS idx_users_staff_id ON users(staff_id);

            CREATE TABLE IF NOT EXISTS roles (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            );
            INSERT OR IGNORE INTO roles (id, name) VALUES
                ('role-staff', 'Staff'),
                ('role-line-manager', 'Line Manager'),
                ('role-reviewer', 'Reviewer'),
                ('role-administrator', 'Administrator');

            CREATE TABLE IF NOT EXISTS user_roles (
                user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                role_id TEXT NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
                PRIMARY KEY (user_id, role_id)
            );

            CREATE TABLE IF NOT EXISTS memos (
                id TEXT PRIMARY KEY,
                reference_number TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                content TEXT NOT NULL,
                department TEXT NOT NULL,
                category TEXT NOT NULL,
                priority TEXT NOT NULL DEFAULT 'Medium',
                memo_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'Draft',
                expiry_date TEXT,
                created_by TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_memos_status ON memos(status);
            CREATE INDEX IF NOT EXISTS idx_memos_created_by ON memos(created_by);
            CREATE INDEX IF NOT EXISTS idx_memos_reference ON memos(reference_number);

            CREATE TABLE IF NOT EXISTS attachments (
                id TEXT PRIMARY KEY,
                memo_id TEXT NOT NULL REFERENCES memos(id) ON DELETE CASCADE,
                file_name TEXT NOT NULL,
                file_path TEXT NOT NULL,
                file_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_attachments_memo ON attachments(memo_id);

            CREATE TABLE IF NOT EXISTS memo_recipients (
                memo_id TEXT NOT NULL REFERENCES memos(id) ON DELETE CASCADE,
                recipient_id TEXT NOT NULL REFERENCES users(id),
                read_at TEXT,
                acknowledged_at TEXT,
                PRIMARY KEY (memo_id, recipient_id)
            );
            CREATE INDEX IF NOT EXISTS idx_memo_recipients_recipient
                ON memo_recipients(recipient_id);

            CREATE TABLE IF NOT EXISTS memo_approvals (
                id TEXT PRIMARY KEY,
                memo_id TEXT NOT NULL REFERENCES memos(id) ON DELETE CASCADE,
                approver_id TEXT NOT NULL REFERENCES users(id),
                step_order INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'Pending',
                comments TEXT,
                processed_at TEXT,
                UNIQUE (memo_id, step_order)
            );
            CREATE INDEX IF NOT EXISTS idx_memo_approvals_memo ON memo_approvals(memo_id);
            CREATE INDEX IF NOT EXISTS idx_memo_approvals_approver
                ON memo_approvals(approver_id, status);

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                memo_id TEXT REFERENCES memos(id) ON DELETE SET NULL,
                message TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user
                ON notifications(user_id, created_at);

            CREATE TABLE IF NOT EXISTS audit_logs (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                action TEXT NOT NULL,
                table_name TEXT NOT NULL,
                record_id TEXT NOT NULL,
                new_value TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_audit_logs_user ON audit_logs(user_id);
        "#,
    },
    Migration {
        version: 2,
        name: "hr_feed",
        sql: r#"
            CREATE TABLE IF NOT EXISTS hr_staff (
                staff_id TEXT PRIMARY KEY,
                first_name TEXT NOT NULL,
                middle_name TEXT,
                surname TEXT NOT NULL,
                official_email TEXT NOT NULL,
                department_code TEXT NOT NULL,
                line_manager_staff_id TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );
            CREATE INDEX IF NOT EXISTS idx_hr_staff_surname ON hr_staff(surname);
        "#,
    },
];

/// Run all pending migrations against the given connection.
///
/// Creates the `_migrations` table if it doesn't exist.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    tracing::info!(
        version = MIGRATIONS.last().map(|m| m.version).unwrap_or(0),
        "Database migrations complete"
    );

    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => {
            let version: i64 = row.get(0).map_err(|e| {
                DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
            })?;
            Ok(version)
        }
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    #[tokio::test]
    async fn migrations_create_all_tables() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        for table in &[
            "users",
            "roles",
            "user_roles",
            "memos",
            "attachments",
            "memo_recipients",
            "memo_approvals",
            "notifications",
            "audit_logs",
            "hr_staff",
            "_migrations",
        ] {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![*table],
                )
                .await
                .unwrap();
            let row = rows.next().await.unwrap().unwrap();
            let count: i64 = row.get(0).unwrap();
            assert_eq!(count, 1, "Table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();
        // Running again should not fail
        run_migrations(&conn).await.unwrap();

        let version = get_current_version(&conn).await.unwrap();
        assert_eq!(version, 2);
    }

    #[tokio::test]
    async fn workflow_roles_are_seeded() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query("SELECT name FROM roles ORDER BY name", ())
            .await
            .unwrap();
        let mut names = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let name: String = row.get(0).unwrap();
            names.push(name);
        }
        assert_eq!(
            names,
            vec!["Administrator", "Line Manager", "Reviewer", "Staff"]
        );
    }

    #[tokio::test]
    async fn duplicate_step_order_is_rejected() {
        let conn = test_conn().await;
        run_migrations(&conn).await.unwrap();

        conn.execute_batch(
            "INSERT INTO users (id, staff_id, username, email, password_hash, department, created_at, updated_at)
             VALUES ('u1', 'S1', 'u', 'u@x', 'h', 'REG', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
             INSERT INTO memos (id, reference_number, title, content, department, category, memo_type, created_by, created_at, updated_at)
             VALUES ('m1', 'IMTS/2026/REG/001', 't', 'c', 'REG', 'General', 'Approval', 'u1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z');
             INSERT INTO memo_approvals (id, memo_id, approver_id, step_order) VALUES ('a1', 'm1', 'u1', 1);",
        )
        .await
        .unwrap();

        let dup = conn
            .execute(
                "INSERT INTO memo_approvals (id, memo_id, approver_id, step_order) VALUES ('a2', 'm1', 'u1', 1)",
                (),
            )
            .await;
        assert!(dup.is_err(), "same step_order twice on one memo must fail");
    }
}
