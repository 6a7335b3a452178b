//! User model
//!
//! Users hold exactly one role. Reviewers are additionally scoped to the
//! categories an admin assigned them to (see `category_reviewers`).

use super::Locale;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    /// Username (unique)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: UserRole,
    /// Whether the author accepted the active article rules
    pub has_accepted_rules: bool,
    /// Locale used for notifications
    pub preferred_locale: Locale,
    /// Inactive users cannot log in
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_reviewer(&self) -> bool {
        self.role == UserRole::Reviewer
    }

    pub fn is_author(&self) -> bool {
        self.role == UserRole::Author
    }
}

/// User role
///
/// Roles are mutually exclusive and assigned by an administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Reads published articles
    #[default]
    Reader,
    /// Writes and submits articles
    Author,
    /// Reviews submitted articles in assigned categories
    Reviewer,
    /// Manages users, categories, rules and assignments
    Admin,
}

impl UserRole {
    pub const ALL: [UserRole; 4] = [
        UserRole::Reader,
        UserRole::Author,
        UserRole::Reviewer,
        UserRole::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Reader => "reader",
            UserRole::Author => "author",
            UserRole::Reviewer => "reviewer",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reader" => Ok(UserRole::Reader),
            "author" => Ok(UserRole::Author),
            "reviewer" => Ok(UserRole::Reviewer),
            "admin" => Ok(UserRole::Admin),
            _ => Err(anyhow::anyhow!("Invalid user role: {}", s)),
        }
    }
}

/// Input for creating a user (admin only; there is no self-registration)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(default)]
    pub preferred_locale: Locale,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_and_display() {
        for role in UserRole::ALL {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert_eq!("ADMIN".parse::<UserRole>().unwrap(), UserRole::Admin);
        assert!("editor".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&UserRole::Reviewer).unwrap();
        assert_eq!(json, "\"reviewer\"");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "aziz".to_string(),
            email: "aziz@example.com".to_string(),
            password_hash: "secret-hash".to_string(),
            role: UserRole::Author,
            has_accepted_rules: false,
            preferred_locale: Locale::Uz,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"role\":\"author\""));
    }
}
