//! Directory administration rules — creation with duplicate detection and
//! the guarded delete.

use chrono::Utc;
use uuid::Uuid;

use crate::auth::password;
use crate::error::{DatabaseError, Error};
use crate::store::{AuditEntry, Database};
use crate::users::model::{NewUser, UserRecord};

/// Result of a create-user request.
#[derive(Debug)]
pub enum CreateUserOutcome {
    Created { id: Uuid },
    /// An account with this staff id or email already exists; the message
    /// tells the admin where to look instead.
    Duplicate { message: String },
}

/// Result of a delete-user request.
#[derive(Debug)]
pub enum DeleteUserOutcome {
    Deleted,
    /// The user is woven into institutional records and can only be
    /// deactivated.
    HasRecords { message: String },
}

/// Create an account, refusing duplicates with a descriptive message.
pub async fn create_user(
    db: &dyn Database,
    admin_id: Uuid,
    new: NewUser,
) -> Result<CreateUserOutcome, Error> {
    if let Some(existing) = db.find_duplicate_user(&new.staff_id, &new.email).await? {
        let status = if existing.is_active { "Active" } else { "Inactive" };
        let roles = if existing.roles.is_empty() {
            "No roles assigned".to_string()
        } else {
            existing.roles.join(", ")
        };
        return Ok(CreateUserOutcome::Duplicate {
            message: format!(
                "This staff member already has an account. Status: {status}. Current roles: \
                 {roles}. Use the Edit button on their existing profile to update their roles \
                 or status."
            ),
        });
    }

    let password_hash = password::hash_password(&new.password)?;
    let now = Utc::now();
    let user = UserRecord {
        id: Uuid::new_v4(),
        staff_id: new.staff_id,
        username: new.username,
        email: new.email,
        password_hash,
        department: new.department,
        line_manager_id: new.line_manager_id,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    let audit = AuditEntry::new(admin_id, "CREATE_USER", "users", user.id);
    match db.insert_user(&user, &new.roles, &audit).await {
        Ok(()) => Ok(CreateUserOutcome::Created { id: user.id }),
        // The probe and the insert can race another admin; the constraint
        // is the authority.
        Err(DatabaseError::Constraint(_)) => Ok(CreateUserOutcome::Duplicate {
            message: "A user with this Staff ID or email already exists.".to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Delete an account unless it is anchored by memos or approvals.
pub async fn delete_user(
    db: &dyn Database,
    admin_id: Uuid,
    user_id: Uuid,
) -> Result<DeleteUserOutcome, Error> {
    if db.user_has_records(user_id).await? {
        return Ok(DeleteUserOutcome::HasRecords {
            message: "This user has authored memos or signed approvals and cannot be removed. \
                      Use \"Inactivate\" to revoke access while preserving the institutional \
                      record."
                .to_string(),
        });
    }

    let audit = AuditEntry::new(admin_id, "DELETE_USER", "users", user_id);
    db.delete_user(user_id, &audit).await?;
    Ok(DeleteUserOutcome::Deleted)
}
