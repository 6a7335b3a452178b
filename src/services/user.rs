//! User service
//!
//! Login/logout, session validation, admin-managed accounts and rules
//! acceptance. There is no self-registration: accounts are created by an
//! administrator, and the first administrator comes from configuration.

use crate::db::repositories::{RulesRepository, SessionRepository, UserRepository};
use crate::models::{CreateUserInput, ListParams, PagedResult, Session, User, UserRole};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::services::policy::{self, Actor};
use anyhow::Context;
use chrono::Utc;
use regex::Regex;
use std::sync::Arc;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

const MAX_USERNAME_LENGTH: usize = 50;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials or an inactive account
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rules_repo: Arc<dyn RulesRepository>,
    session_expiration_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        rules_repo: Arc<dyn RulesRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            rules_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    pub fn with_session_expiration(mut self, days: i64) -> Self {
        self.session_expiration_days = days.max(1);
        self
    }

    /// Verify credentials and open a session
    pub async fn login(&self, input: LoginInput) -> Result<(Session, User), UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .find_user_by_username_or_email(input.username_or_email.trim())
            .await?
            .ok_or_else(invalid)?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !password_valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(invalid());
        }

        if !user.is_active {
            return Err(UserServiceError::AuthenticationError(
                "Your account has been deactivated".to_string(),
            ));
        }

        let session = self.create_session(user.id).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok((session, user))
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired sessions and inactive
    /// users resolve to `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to delete expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user.filter(|u| u.is_active))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Delete all expired sessions. Returns how many were removed.
    pub async fn cleanup_expired_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    /// Create an account (admin only)
    pub async fn create_user(
        &self,
        actor: &Actor,
        input: CreateUserInput,
    ) -> Result<User, UserServiceError> {
        require_admin(actor)?;
        let user = self.insert_user(input).await?;
        tracing::info!(user_id = user.id, role = %user.role, actor_id = actor.id, "User created");
        Ok(user)
    }

    /// Create the configured administrator unless an admin already exists.
    /// Returns the new admin, if one was created.
    pub async fn bootstrap_admin(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let admins = self
            .user_repo
            .list_by_role(UserRole::Admin)
            .await
            .context("Failed to list admins")?;
        if !admins.is_empty() {
            return Ok(None);
        }

        let admin = self
            .insert_user(CreateUserInput {
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role: UserRole::Admin,
                preferred_locale: Default::default(),
            })
            .await?;
        tracing::info!(user_id = admin.id, username = %admin.username, "Bootstrap admin created");
        Ok(Some(admin))
    }

    pub async fn list_users(
        &self,
        actor: &Actor,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        require_admin(actor)?;
        let (items, total) = self
            .user_repo
            .list(params.page as i64, params.limit())
            .await
            .context("Failed to list users")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Change a user's role. Leaving the reviewer role drops the user's
    /// category assignments.
    pub async fn set_role(
        &self,
        actor: &Actor,
        id: i64,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        require_admin(actor)?;
        if actor.id == id && role != UserRole::Admin {
            return Err(UserServiceError::ValidationError(
                "You cannot remove your own administrator role".to_string(),
            ));
        }

        let user = self
            .user_repo
            .set_role(id, role)
            .await
            .context("Failed to change role")?
            .ok_or(UserServiceError::NotFound)?;
        tracing::info!(user_id = id, role = %role, actor_id = actor.id, "User role changed");
        Ok(user)
    }

    /// Activate or deactivate an account. Deactivation ends its sessions.
    pub async fn set_active(
        &self,
        actor: &Actor,
        id: i64,
        active: bool,
    ) -> Result<User, UserServiceError> {
        require_admin(actor)?;
        if actor.id == id && !active {
            return Err(UserServiceError::ValidationError(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let mut user = self.load(id).await?;
        user.is_active = active;
        let user = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user")?;

        if !active {
            self.session_repo
                .delete_by_user(id)
                .await
                .context("Failed to delete sessions")?;
        }
        tracing::info!(user_id = id, active, actor_id = actor.id, "User activation changed");
        Ok(user)
    }

    /// Record that an author accepted the currently active rules
    pub async fn accept_rules(&self, actor: &Actor) -> Result<User, UserServiceError> {
        if !policy::can_accept_rules(actor) {
            return Err(UserServiceError::PermissionDenied(
                "Only authors accept the article rules".to_string(),
            ));
        }

        let active = self
            .rules_repo
            .get_active()
            .await
            .context("Failed to load active rules")?;
        if active.is_none() {
            return Err(UserServiceError::ValidationError(
                "There are no active rules to accept".to_string(),
            ));
        }

        let mut user = self.load(actor.id).await?;
        user.has_accepted_rules = true;
        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to record rules acceptance")?)
    }

    async fn load(&self, id: i64) -> Result<User, UserServiceError> {
        self.user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)
    }

    async fn insert_user(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_lowercase();
        validate_user_input(&username, &email, &input.password)?;

        if self
            .user_repo
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let now = Utc::now();
        let user = User {
            id: 0,
            username,
            email,
            password_hash,
            role: input.role,
            has_accepted_rules: false,
            preferred_locale: input.preferred_locale,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        Ok(self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?)
    }

    async fn find_user_by_username_or_email(
        &self,
        username_or_email: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let user = if username_or_email.contains('@') {
            self.user_repo
                .get_by_email(&username_or_email.to_lowercase())
                .await
                .context("Failed to get user by email")?
        } else {
            self.user_repo
                .get_by_username(username_or_email)
                .await
                .context("Failed to get user by username")?
        };
        Ok(user)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let session = Session::issue(user_id, self.session_expiration_days);

        Ok(self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?)
    }
}

fn require_admin(actor: &Actor) -> Result<(), UserServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(UserServiceError::PermissionDenied(
            "Administrator access required".to_string(),
        ))
    }
}

fn validate_user_input(username: &str, email: &str, password: &str) -> Result<(), UserServiceError> {
    if username.is_empty() {
        return Err(UserServiceError::ValidationError(
            "Username cannot be empty".to_string(),
        ));
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if username.chars().count() > MAX_USERNAME_LENGTH || !username.chars().all(allowed) {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be at most {} letters, digits, '.', '_' or '-'",
            MAX_USERNAME_LENGTH
        )));
    }
    let email_re = Regex::new(EMAIL_PATTERN).context("Invalid email pattern")?;
    if !email_re.is_match(email) {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// Input for user login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}
