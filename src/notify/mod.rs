//! Notifications — in-app records plus optional SMTP email dispatch.
//!
//! Every workflow transition writes `notifications` rows in the same
//! transaction as the transition itself; email delivery is best-effort
//! on top and never blocks or fails the workflow.

pub mod email;
pub mod routes;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

pub use email::EmailConfig;

use crate::store::Database;

/// A persisted in-app notification.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A notification to be written as part of a workflow mutation.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub memo_id: Option<Uuid>,
    pub message: String,
}

impl NewNotification {
    pub fn new(user_id: Uuid, memo_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            user_id,
            memo_id: Some(memo_id),
            message: message.into(),
        }
    }
}

/// Fans notifications out to email when SMTP is configured.
///
/// The in-app rows are already committed by the time this runs.
pub struct Notifier {
    db: Arc<dyn Database>,
    email: Option<EmailConfig>,
}

impl Notifier {
    pub fn new(db: Arc<dyn Database>, email: Option<EmailConfig>) -> Self {
        Self { db, email }
    }

    /// Whether email dispatch is enabled.
    pub fn email_enabled(&self) -> bool {
        self.email.is_some()
    }

    /// Send an email copy of each notification to its target user.
    ///
    /// Lookup or SMTP failures are logged and swallowed; the in-app
    /// notification is the system of record.
    pub async fn dispatch(&self, notifications: &[NewNotification]) {
        let Some(config) = &self.email else {
            return;
        };

        for notification in notifications {
            let user = match self.db.get_user(notification.user_id).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    warn!(user_id = %notification.user_id, "Notification target no longer exists");
                    continue;
                }
                Err(e) => {
                    warn!(user_id = %notification.user_id, error = %e, "Failed to load notification target");
                    continue;
                }
            };

            if let Err(e) = email::send_notification_email(config, &user.email, &notification.message)
            {
                warn!(to = %user.email, error = %e, "Failed to send notification email");
            }
        }
    }
}
