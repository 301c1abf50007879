//! User repository
//!
//! Accounts, group membership and the profile row that caches role flags.

use crate::db::{insert_ignore, with_pool, DynDatabasePool, InsertId};
use crate::models::{Group, Profile, User};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, created_at";

const PROFILE_SELECT: &str = r#"
    SELECT p.id, p.user_id, u.username, p.is_editor, p.is_editor_in_chief
    FROM profiles p
    INNER JOIN users u ON u.id = p.user_id
"#;

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Persist email and name fields
    async fn update(&self, user: &User) -> Result<User>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Id of the oldest account
    async fn first_user_id(&self) -> Result<Option<i64>>;

    /// All users ordered by username
    async fn list(&self) -> Result<Vec<User>>;

    async fn add_to_group(&self, user_id: i64, group: Group) -> Result<()>;

    async fn remove_from_group(&self, user_id: i64, group: Group) -> Result<()>;

    /// Names of the groups the user belongs to
    async fn get_groups(&self, user_id: i64) -> Result<Vec<String>>;

    async fn create_profile(&self, user_id: i64) -> Result<Profile>;

    async fn get_profile(&self, profile_id: i64) -> Result<Option<Profile>>;

    async fn get_profile_by_user(&self, user_id: i64) -> Result<Option<Profile>>;

    async fn set_profile_flags(&self, user_id: i64, is_editor: bool, is_editor_in_chief: bool) -> Result<()>;

    async fn list_profiles(&self) -> Result<Vec<Profile>>;
}

/// SQLx-based user repository, SQLite or MySQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let created_at = Utc::now();
        let id = with_pool!(self.pool, |pool| {
            sqlx::query(
                "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(username)
            .bind(email)
            .bind(password_hash)
            .bind(created_at)
            .execute(pool)
            .await
            .context("Failed to create user")?
            .inserted_id()
        });

        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password_hash: password_hash.to_string(),
            created_at,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let user = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by ID")?
        });
        Ok(user)
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        let user = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(&sql)
                .bind(username)
                .fetch_optional(pool)
                .await
                .context("Failed to get user by username")?
        });
        Ok(user)
    }

    async fn update(&self, user: &User) -> Result<User> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE users SET email = ?, first_name = ?, last_name = ? WHERE id = ?")
                .bind(&user.email)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(user.id)
                .execute(pool)
                .await
                .context("Failed to update user")?;
        });
        Ok(user.clone())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
                .bind(password_hash)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update password")?;
        });
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to count users")?
        });
        Ok(count)
    }

    async fn first_user_id(&self) -> Result<Option<i64>> {
        let id = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, Option<i64>>("SELECT MIN(id) FROM users")
                .fetch_one(pool)
                .await
                .context("Failed to find the first user")?
        });
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM users ORDER BY username", USER_COLUMNS);
        let users = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, User>(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list users")?
        });
        Ok(users)
    }

    async fn add_to_group(&self, user_id: i64, group: Group) -> Result<()> {
        let sql = format!(
            "{} INTO auth_user_groups (user_id, group_id) SELECT ?, id FROM auth_groups WHERE name = ?",
            insert_ignore(&self.pool)
        );
        with_pool!(self.pool, |pool| {
            sqlx::query(&sql)
                .bind(user_id)
                .bind(group.as_str())
                .execute(pool)
                .await
                .context("Failed to add user to group")?;
        });
        Ok(())
    }

    async fn remove_from_group(&self, user_id: i64, group: Group) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query(
                r#"
                DELETE FROM auth_user_groups
                WHERE user_id = ? AND group_id IN (SELECT id FROM auth_groups WHERE name = ?)
                "#,
            )
            .bind(user_id)
            .bind(group.as_str())
            .execute(pool)
            .await
            .context("Failed to remove user from group")?;
        });
        Ok(())
    }

    async fn get_groups(&self, user_id: i64) -> Result<Vec<String>> {
        let groups = with_pool!(self.pool, |pool| {
            sqlx::query_scalar::<_, String>(
                r#"
                SELECT g.name
                FROM auth_groups g
                INNER JOIN auth_user_groups ug ON ug.group_id = g.id
                WHERE ug.user_id = ?
                ORDER BY g.id
                "#,
            )
            .bind(user_id)
            .fetch_all(pool)
            .await
            .context("Failed to get user groups")?
        });
        Ok(groups)
    }

    async fn create_profile(&self, user_id: i64) -> Result<Profile> {
        with_pool!(self.pool, |pool| {
            sqlx::query("INSERT INTO profiles (user_id) VALUES (?)")
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to create profile")?;
        });
        self.get_profile_by_user(user_id)
            .await?
            .context("Profile missing after insert")
    }

    async fn get_profile(&self, profile_id: i64) -> Result<Option<Profile>> {
        let sql = format!("{} WHERE p.id = ?", PROFILE_SELECT);
        let profile = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Profile>(&sql)
                .bind(profile_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get profile")?
        });
        self.with_groups(profile).await
    }

    async fn get_profile_by_user(&self, user_id: i64) -> Result<Option<Profile>> {
        let sql = format!("{} WHERE p.user_id = ?", PROFILE_SELECT);
        let profile = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Profile>(&sql)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .context("Failed to get profile by user")?
        });
        self.with_groups(profile).await
    }

    async fn set_profile_flags(&self, user_id: i64, is_editor: bool, is_editor_in_chief: bool) -> Result<()> {
        with_pool!(self.pool, |pool| {
            sqlx::query("UPDATE profiles SET is_editor = ?, is_editor_in_chief = ? WHERE user_id = ?")
                .bind(is_editor)
                .bind(is_editor_in_chief)
                .bind(user_id)
                .execute(pool)
                .await
                .context("Failed to update profile flags")?;
        });
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let sql = format!("{} ORDER BY u.username", PROFILE_SELECT);
        let profiles = with_pool!(self.pool, |pool| {
            sqlx::query_as::<_, Profile>(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list profiles")?
        });

        let mut result = Vec::with_capacity(profiles.len());
        for mut profile in profiles {
            profile.groups = self.get_groups(profile.user_id).await?;
            result.push(profile);
        }
        Ok(result)
    }
}

impl SqlxUserRepository {
    async fn with_groups(&self, profile: Option<Profile>) -> Result<Option<Profile>> {
        match profile {
            Some(mut profile) => {
                profile.groups = self.get_groups(profile.user_id).await?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    async fn setup_test_repo() -> SqlxUserRepository {
        SqlxUserRepository::new(setup_pool().await)
    }

    #[tokio::test]
    async fn test_create_and_lookup_user() {
        let repo = setup_test_repo().await;

        let user = repo.create("alice", "alice@example.com", "hash").await.unwrap();
        assert!(user.id > 0);

        let by_id = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(by_id.username, "alice");
        assert_eq!(by_id.first_name, "");

        let by_name = repo.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, user.id);
        assert!(repo.get_by_username("bob").await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_fails() {
        let repo = setup_test_repo().await;
        repo.create("alice", "", "hash").await.unwrap();
        assert!(repo.create("alice", "", "hash").await.is_err());
    }

    #[tokio::test]
    async fn test_update_fields_and_password() {
        let repo = setup_test_repo().await;
        let mut user = repo.create("alice", "", "hash").await.unwrap();

        user.first_name = "Alice".to_string();
        user.email = "a@example.com".to_string();
        repo.update(&user).await.unwrap();
        repo.update_password(user.id, "new-hash").await.unwrap();

        let stored = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.first_name, "Alice");
        assert_eq!(stored.email, "a@example.com");
        assert_eq!(stored.password_hash, "new-hash");
    }

    #[tokio::test]
    async fn test_groups_and_profile() {
        let repo = setup_test_repo().await;
        let user = repo.create("editor", "", "hash").await.unwrap();

        let profile = repo.create_profile(user.id).await.unwrap();
        assert!(!profile.is_editor);
        assert!(!profile.is_editor_in_chief);
        assert_eq!(profile.username, "editor");

        repo.add_to_group(user.id, Group::Reader).await.unwrap();
        repo.add_to_group(user.id, Group::Editor).await.unwrap();
        repo.add_to_group(user.id, Group::Editor).await.unwrap();
        assert_eq!(repo.get_groups(user.id).await.unwrap(), vec!["Reader", "Editor"]);

        repo.set_profile_flags(user.id, true, false).await.unwrap();
        let profile = repo.get_profile(profile.id).await.unwrap().unwrap();
        assert!(profile.is_editor);
        assert!(profile.belong_to("Editor"));

        repo.remove_from_group(user.id, Group::Editor).await.unwrap();
        assert_eq!(repo.get_groups(user.id).await.unwrap(), vec!["Reader"]);
        assert_eq!(repo.list_profiles().await.unwrap().len(), 1);
    }
}
