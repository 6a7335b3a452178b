//! Sign-in sessions
//!
//! A session is an opaque random token handed to the client as a bearer
//! token and an HttpOnly cookie. The token is never serialized back out.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    /// Bearer token
    #[serde(skip_serializing)]
    pub id: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Fresh session for `user_id`, valid for `lifetime_days`
    pub fn issue(user_id: i64, lifetime_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(lifetime_days),
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_lifetime() {
        let session = Session::issue(7, 30);
        assert_eq!(session.user_id, 7);
        assert_eq!(session.expires_at - session.created_at, Duration::days(30));
        assert!(!session.is_expired());
        assert!(session.is_expired_at(session.expires_at));
        assert_ne!(Session::issue(7, 30).id, session.id);
    }

    #[test]
    fn test_token_is_not_serialized() {
        let session = Session::issue(1, 1);
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["user_id"], 1);
    }
}
