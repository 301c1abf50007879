//! User service
//!
//! Accounts, sessions and the editorial roles:
//! - every new account joins the Reader group,
//! - the first account also becomes Editor in Chief,
//! - profile flags are recomputed from group membership on every change.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Group, Profile, Session, UpdateUserInput, User};
use crate::services::password::{hash_password, validate_password, verify_password};
use crate::services::rate_limiter::LoginRateLimiter;
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Too many failed login attempts, try again later")]
    RateLimited,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for user login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    rate_limiter: LoginRateLimiter,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self {
            user_repo,
            session_repo,
            rate_limiter: LoginRateLimiter::new(),
        }
    }

    /// Register a reader account.
    ///
    /// When no user exists yet, the new account is also made Editor in Chief.
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let first = self.is_first_user().await?;
        let groups: &[Group] = if first {
            &[Group::Reader, Group::Editor, Group::EditorInChief]
        } else {
            &[Group::Reader]
        };
        let user = self.create_account(input, groups).await?;
        if !first {
            return Ok(user);
        }

        // Concurrent first registrations can all pass the count check; only
        // the oldest account keeps the editorial groups.
        if self.user_repo.first_user_id().await? == Some(user.id) {
            tracing::info!("First user '{}' registered as Editor in Chief", user.username);
        } else {
            tracing::warn!("'{}' lost the first-user race, registered as reader", user.username);
            self.user_repo.remove_from_group(user.id, Group::EditorInChief).await?;
            self.user_repo.remove_from_group(user.id, Group::Editor).await?;
            self.sync_profile_flags(user.id).await?;
        }
        Ok(user)
    }

    /// Register an account that joins the Editor group straight away
    pub async fn register_editor(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        self.create_account(input, &[Group::Reader, Group::Editor]).await
    }

    /// Check credentials and open a session.
    ///
    /// Failed attempts count against the username; five within fifteen
    /// minutes lock further logins for that name.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let username = input.username.trim();
        if self.rate_limiter.is_limited(username).await {
            tracing::warn!("Login rate limit hit for '{}'", username);
            return Err(UserServiceError::RateLimited);
        }

        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;

        let valid = match &user {
            Some(user) => verify_password(&input.password, &user.password_hash)
                .context("Failed to verify password")?,
            None => false,
        };

        let user = match user {
            Some(user) if valid => user,
            _ => {
                self.rate_limiter.record_failure(username).await;
                return Err(UserServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                ));
            }
        };

        self.rate_limiter.clear(username).await;
        let session = self
            .session_repo
            .create(&Session::new(user.id))
            .await
            .context("Failed to create session")?;

        tracing::debug!("User '{}' logged in", user.username);
        Ok(session)
    }

    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user. Expired sessions are removed.
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
            let _ = self.session_repo.delete(token).await;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        let count = self.user_repo.count().await.context("Failed to count users")?;
        Ok(count == 0)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self.user_repo.get_by_id(id).await.context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    pub async fn get_profile(&self, profile_id: i64) -> Result<Profile, UserServiceError> {
        self.user_repo
            .get_profile(profile_id)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| UserServiceError::NotFound(format!("Profile {} not found", profile_id)))
    }

    pub async fn get_profile_by_user(&self, user_id: i64) -> Result<Profile, UserServiceError> {
        self.user_repo
            .get_profile_by_user(user_id)
            .await
            .context("Failed to get profile")?
            .ok_or_else(|| UserServiceError::NotFound(format!("Profile for user {} not found", user_id)))
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, UserServiceError> {
        Ok(self.user_repo.list_profiles().await.context("Failed to list profiles")?)
    }

    /// Update email and names; absent fields keep their value
    pub async fn update_user(&self, user_id: i64, input: UpdateUserInput) -> Result<User, UserServiceError> {
        let mut user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user_id)))?;

        if let Some(email) = input.email {
            let email = email.trim().to_string();
            validate_email(&email)?;
            user.email = email;
        }
        if let Some(first_name) = input.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name.trim().to_string();
        }

        Ok(self.user_repo.update(&user).await.context("Failed to update user")?)
    }

    /// Replace the password after checking the current one
    pub async fn change_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", user_id)))?;

        if !verify_password(old_password, &user.password_hash).context("Failed to verify password")? {
            return Err(UserServiceError::ValidationError(
                "Your old password was entered incorrectly".to_string(),
            ));
        }
        validate_password(new_password).map_err(UserServiceError::ValidationError)?;

        let hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user_id, &hash)
            .await
            .context("Failed to update password")?;
        Ok(())
    }

    /// Grant or revoke the Editor group
    pub async fn set_editor(&self, user_id: i64, editor: bool) -> Result<Profile, UserServiceError> {
        if editor {
            self.user_repo.add_to_group(user_id, Group::Editor).await?;
        } else {
            self.user_repo.remove_from_group(user_id, Group::Editor).await?;
        }
        self.sync_profile_flags(user_id).await?;
        tracing::info!("User {} editor flag set to {}", user_id, editor);
        self.get_profile_by_user(user_id).await
    }

    /// Forget failed-login records that have aged out
    pub async fn cleanup_rate_limits(&self) {
        self.rate_limiter.cleanup().await;
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }

    async fn create_account(&self, input: CreateUserInput, groups: &[Group]) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        validate_username(&username)?;
        validate_email(&email)?;
        validate_password(&input.password).map_err(UserServiceError::ValidationError)?;

        if self.get_by_username(&username).await?.is_some() {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&username, &email, &password_hash)
            .await
            .context("Failed to create user")?;

        self.user_repo.create_profile(user.id).await?;
        for group in groups {
            self.user_repo.add_to_group(user.id, *group).await?;
        }
        self.sync_profile_flags(user.id).await?;

        Ok(user)
    }

    async fn sync_profile_flags(&self, user_id: i64) -> Result<(), UserServiceError> {
        let groups = self.user_repo.get_groups(user_id).await?;
        let (is_editor, is_editor_in_chief) = Profile::flags_for_groups(&groups);
        self.user_repo
            .set_profile_flags(user_id, is_editor, is_editor_in_chief)
            .await?;
        Ok(())
    }
}

fn validate_username(username: &str) -> Result<(), UserServiceError> {
    let len = username.chars().count();
    if !(3..=50).contains(&len) {
        return Err(UserServiceError::ValidationError(
            "Username must be between 3 and 50 characters".to_string(),
        ));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(UserServiceError::ValidationError(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

/// Email is optional, but must look like an address when given
fn validate_email(email: &str) -> Result<(), UserServiceError> {
    if !email.is_empty() && !email.contains('@') {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use chrono::{Duration, Utc};

    async fn setup_test_service() -> UserService {
        let pool = setup_pool().await;
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn input(username: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "harbor-password".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_editor_in_chief() {
        let service = setup_test_service().await;

        let chief = service.register(input("chief")).await.unwrap();
        let profile = service.get_profile_by_user(chief.id).await.unwrap();
        assert!(profile.is_editor);
        assert!(profile.is_editor_in_chief);
        assert!(profile.belong_to("Editor in Chief"));

        let reader = service.register(input("reader")).await.unwrap();
        let profile = service.get_profile_by_user(reader.id).await.unwrap();
        assert!(!profile.is_editor);
        assert!(!profile.is_editor_in_chief);
        assert!(profile.belong_to("Reader"));
        assert_eq!(profile.get_profile_name(), "profile_reader");
    }

    #[tokio::test]
    async fn test_concurrent_first_registrations_make_one_chief() {
        let service = setup_test_service().await;

        let (first, second) = tokio::join!(
            service.register(input("alpha")),
            service.register(input("bravo"))
        );
        let ids = [first.unwrap().id, second.unwrap().id];

        let mut chiefs = 0;
        for id in ids {
            let profile = service.get_profile_by_user(id).await.unwrap();
            assert_eq!(profile.is_editor, profile.is_editor_in_chief);
            if profile.is_editor_in_chief {
                chiefs += 1;
                assert_eq!(id, *ids.iter().min().unwrap());
            }
        }
        assert_eq!(chiefs, 1);
    }

    #[tokio::test]
    async fn test_cleanup_rate_limits_keeps_recent_failures() {
        let service = setup_test_service().await;
        service.register(input("chief")).await.unwrap();

        for _ in 0..5 {
            let _ = service.login(LoginInput::new("chief", "wrong-password")).await;
        }
        service.cleanup_rate_limits().await;
        assert!(matches!(
            service.login(LoginInput::new("chief", "harbor-password")).await,
            Err(UserServiceError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_register_editor() {
        let service = setup_test_service().await;
        service.register(input("chief")).await.unwrap();

        let editor = service.register_editor(input("editor")).await.unwrap();
        let profile = service.get_profile_by_user(editor.id).await.unwrap();
        assert!(profile.is_editor);
        assert!(!profile.is_editor_in_chief);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup_test_service().await;

        let mut bad_name = input("ab");
        assert!(matches!(
            service.register(bad_name.clone()).await,
            Err(UserServiceError::ValidationError(_))
        ));
        bad_name.username = "has space".into();
        assert!(matches!(
            service.register(bad_name).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let mut short_password = input("reader");
        short_password.password = "short".into();
        assert!(matches!(
            service.register(short_password).await,
            Err(UserServiceError::ValidationError(_))
        ));

        let mut bad_email = input("reader");
        bad_email.email = "nope".into();
        assert!(matches!(
            service.register(bad_email).await,
            Err(UserServiceError::ValidationError(_))
        ));

        service.register(input("reader")).await.unwrap();
        assert!(matches!(
            service.register(input("reader")).await,
            Err(UserServiceError::UserExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_logout_and_session() {
        let service = setup_test_service().await;
        let user = service.register(input("reader")).await.unwrap();

        let session = service
            .login(LoginInput::new("reader", "harbor-password"))
            .await
            .unwrap();
        let resolved = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(resolved.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_are_rate_limited() {
        let service = setup_test_service().await;
        service.register(input("reader")).await.unwrap();

        for _ in 0..5 {
            assert!(matches!(
                service.login(LoginInput::new("reader", "wrong-password")).await,
                Err(UserServiceError::AuthenticationError(_))
            ));
        }
        assert!(matches!(
            service.login(LoginInput::new("reader", "harbor-password")).await,
            Err(UserServiceError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let pool = setup_pool().await;
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(SqlxUserRepository::boxed(pool), session_repo.clone());
        let user = service.register(input("reader")).await.unwrap();

        let mut session = Session::new(user.id);
        session.expires_at = Utc::now() - Duration::minutes(1);
        session_repo.create(&session).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        assert!(session_repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_and_change_password() {
        let service = setup_test_service().await;
        let user = service.register(input("reader")).await.unwrap();

        let updated = service
            .update_user(
                user.id,
                UpdateUserInput {
                    first_name: Some("Ada".into()),
                    last_name: Some("Byron".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name(), "Ada Byron");
        assert_eq!(updated.email, "reader@example.com");

        assert!(matches!(
            service.change_password(user.id, "not-the-password", "new-password-1").await,
            Err(UserServiceError::ValidationError(_))
        ));
        service
            .change_password(user.id, "harbor-password", "new-password-1")
            .await
            .unwrap();
        assert!(service.login(LoginInput::new("reader", "new-password-1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_set_editor() {
        let service = setup_test_service().await;
        service.register(input("chief")).await.unwrap();
        let user = service.register(input("reader")).await.unwrap();

        let profile = service.set_editor(user.id, true).await.unwrap();
        assert!(profile.is_editor);
        assert!(profile.belong_to("Editor"));

        let profile = service.set_editor(user.id, false).await.unwrap();
        assert!(!profile.is_editor);
    }
}
