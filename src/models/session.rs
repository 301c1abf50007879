//! Session model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifetime of a login session
pub const SESSION_DAYS: i64 = 7;

/// Session entity for user authentication
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Session {
    /// Session ID (token)
    pub id: String,
    /// Associated user ID
    pub user_id: i64,
    /// Expiration timestamp
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a fresh session for `user_id` with a random token
    pub fn new(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(SESSION_DAYS),
            created_at: now,
        }
    }

    /// Check if the session has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at < Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_expires_in_a_week() {
        let session = Session::new(3);
        assert_eq!(session.user_id, 3);
        assert!(!session.is_expired());
        assert_eq!((session.expires_at - session.created_at).num_days(), SESSION_DAYS);
        assert_ne!(Session::new(3).id, session.id);
    }
}
