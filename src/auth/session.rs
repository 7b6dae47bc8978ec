//! In-memory session store keyed by opaque bearer tokens.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::model::UserRecord;

const TOKEN_LENGTH: usize = 48;

/// An authenticated session. The roles are snapshotted at login; a role
/// change takes effect at the next login.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub department: String,
    pub roles: Vec<String>,
    #[serde(skip)]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Token-indexed session map with idle expiry.
///
/// Reads refresh the expiry (sliding TTL); expired entries are pruned
/// whenever a new session is created.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a session for a verified user and return it.
    pub async fn create(&self, user: &UserRecord, roles: Vec<String>) -> Session {
        let session = Session {
            token: generate_token(),
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            department: user.department.clone(),
            roles,
            expires_at: Utc::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > Utc::now());
        sessions.insert(session.token.clone(), session.clone());
        session
    }

    /// Look up a session by token, refreshing its expiry. Returns `None`
    /// for unknown or expired tokens.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token)?;
        if session.expires_at <= Utc::now() {
            sessions.remove(token);
            return None;
        }
        session.expires_at = Utc::now() + self.ttl;
        Some(session.clone())
    }

    /// Drop a session. Returns whether it existed.
    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Number of live sessions (tests).
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            staff_id: "CU-1001".into(),
            username: "ada".into(),
            email: "ada@example.edu".into(),
            password_hash: String::new(),
            department: "Registry".into(),
            line_manager_id: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn create_and_get_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let user = test_user();
        let session = store.create(&user, vec!["Staff".into()]).await;

        let fetched = store.get(&session.token).await.expect("session missing");
        assert_eq!(fetched.user_id, user.id);
        assert!(fetched.has_role("Staff"));
        assert!(!fetched.has_role("Administrator"));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected() {
        let store = SessionStore::new(Duration::from_secs(0));
        let session = store.create(&test_user(), vec![]).await;
        assert!(store.get(&session.token).await.is_none());
    }

    #[tokio::test]
    async fn revoke_removes_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let session = store.create(&test_user(), vec![]).await;
        assert!(store.revoke(&session.token).await);
        assert!(store.get(&session.token).await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[test]
    fn tokens_are_long_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
