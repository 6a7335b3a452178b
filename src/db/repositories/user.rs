//! User repository
//!
//! Database operations for users and their roles.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Locale, User, UserRole};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, has_accepted_rules, \
     preferred_locale, is_active, created_at, updated_at";

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `id` and timestamps of the argument are ignored
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist email, password hash, locale, active flag and rules acceptance
    async fn update(&self, user: &User) -> Result<User>;

    /// Change a user's role. Leaving the reviewer role drops the user's
    /// category assignments in the same transaction.
    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>>;

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;

    /// Active users holding `role`, ordered by id
    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>>;

    /// User counts per role
    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>>;
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await?,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await?,
        };
        self.get_by_id(id)
            .await?
            .context("User not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, id).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, id).await,
        }
        .context("Failed to get user by ID")
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, username).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, username).await,
        }
        .context("Failed to get user by username")
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER(?)");
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_user_sqlite(pool, &sql, email).await,
            Backend::Mysql(pool) => fetch_user_mysql(pool, &sql, email).await,
        }
        .context("Failed to get user by email")
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await?,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await?,
        }
        self.get_by_id(user.id)
            .await?
            .context("User not found after update")
    }

    async fn set_role(&self, id: i64, role: UserRole) -> Result<Option<User>> {
        let updated = match self.pool.backend() {
            Backend::Sqlite(pool) => set_role_sqlite(pool, id, role).await?,
            Backend::Mysql(pool) => set_role_mysql(pool, id, role).await?,
        };
        if !updated {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT ? OFFSET ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users")
                    .fetch_one(pool)
                    .await
                    .context("Failed to count users")?
                    .get("count");
                let users = rows.iter().map(row_to_user_sqlite).collect::<Result<_>>()?;
                Ok((users, total))
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list users")?;
                let total: i64 = sqlx::query("SELECT COUNT(*) AS count FROM users")
                    .fetch_one(pool)
                    .await
                    .context("Failed to count users")?
                    .get("count");
                let users = rows.iter().map(row_to_user_mysql).collect::<Result<_>>()?;
                Ok((users, total))
            }
        }
    }

    async fn list_by_role(&self, role: UserRole) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = ? AND is_active = TRUE ORDER BY id"
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(role.as_str())
                .fetch_all(pool)
                .await
                .context("Failed to list users by role")?
                .iter()
                .map(row_to_user_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(role.as_str())
                .fetch_all(pool)
                .await
                .context("Failed to list users by role")?
                .iter()
                .map(row_to_user_mysql)
                .collect(),
        }
    }

    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>> {
        let sql = "SELECT role, COUNT(*) AS count FROM users GROUP BY role";
        let pairs: Vec<(String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to count users by role")?
                .iter()
                .map(|row| (row.get("role"), row.get("count")))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await
                .context("Failed to count users by role")?
                .iter()
                .map(|row| (row.get("role"), row.get("count")))
                .collect(),
        };

        pairs
            .into_iter()
            .map(|(role, count)| Ok((role.parse::<UserRole>()?, count)))
            .collect()
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, has_accepted_rules,
                           preferred_locale, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.has_accepted_rules)
    .bind(user.preferred_locale.as_str())
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_rowid())
}

async fn fetch_user_sqlite<'q, T>(pool: &SqlitePool, sql: &'q str, key: T) -> Result<Option<User>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    let row = sqlx::query(sql).bind(key).fetch_optional(pool).await?;
    row.as_ref().map(row_to_user_sqlite).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, has_accepted_rules = ?, preferred_locale = ?,
            is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.has_accepted_rules)
    .bind(user.preferred_locale.as_str())
    .bind(user.is_active)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(())
}

async fn set_role_sqlite(pool: &SqlitePool, id: i64, role: UserRole) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user role")?;

    if role != UserRole::Reviewer {
        sqlx::query("DELETE FROM category_reviewers WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear reviewer categories")?;
    }
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    let locale: String = row.get("preferred_locale");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        has_accepted_rules: row.get("has_accepted_rules"),
        preferred_locale: locale.parse().unwrap_or(Locale::Uz),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, has_accepted_rules,
                           preferred_locale, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.has_accepted_rules)
    .bind(user.preferred_locale.as_str())
    .bind(user.is_active)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(result.last_insert_id() as i64)
}

async fn fetch_user_mysql<'q, T>(pool: &MySqlPool, sql: &'q str, key: T) -> Result<Option<User>>
where
    T: 'q + Send + sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    let row = sqlx::query(sql).bind(key).fetch_optional(pool).await?;
    row.as_ref().map(row_to_user_mysql).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, password_hash = ?, has_accepted_rules = ?, preferred_locale = ?,
            is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.has_accepted_rules)
    .bind(user.preferred_locale.as_str())
    .bind(user.is_active)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(())
}

async fn set_role_mysql(pool: &MySqlPool, id: i64, role: UserRole) -> Result<bool> {
    let mut tx = pool.begin().await?;
    // MySQL reports 0 affected rows when the value is unchanged, so check existence separately
    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to update user role")?;
    let exists = sqlx::query("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();

    if role != UserRole::Reviewer {
        sqlx::query("DELETE FROM category_reviewers WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to clear reviewer categories")?;
    }
    tx.commit().await?;

    Ok(exists)
}

pub(crate) fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let role: String = row.get("role");
    let locale: String = row.get("preferred_locale");

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: role.parse()?,
        has_accepted_rules: row.get("has_accepted_rules"),
        preferred_locale: locale.parse().unwrap_or(Locale::Uz),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{new_user, seed_category, seed_user, setup_pool};
    use crate::db::repositories::{CategoryRepository, SqlxCategoryRepository};

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let created = repo.create(&new_user("dilnoza", UserRole::Author)).await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.role, UserRole::Author);
        assert!(!created.has_accepted_rules);

        let by_name = repo.get_by_username("dilnoza").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        let by_email = repo.get_by_email("DILNOZA@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        repo.create(&new_user("dup", UserRole::Reader)).await.unwrap();
        assert!(repo.create(&new_user("dup", UserRole::Reader)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_persists_flags() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool);

        let mut user = repo.create(&new_user("aziz", UserRole::Author)).await.unwrap();
        user.has_accepted_rules = true;
        user.preferred_locale = Locale::Ru;
        user.is_active = false;
        let updated = repo.update(&user).await.unwrap();

        assert!(updated.has_accepted_rules);
        assert_eq!(updated.preferred_locale, Locale::Ru);
        assert!(!updated.is_active);
    }

    #[tokio::test]
    async fn test_set_role_away_from_reviewer_clears_categories() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());
        let categories = SqlxCategoryRepository::new(pool.clone());

        let reviewer = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        let tech = seed_category(&pool, "tech").await;
        categories.add_reviewer(tech.id, reviewer.id).await.unwrap();

        let changed = repo.set_role(reviewer.id, UserRole::Author).await.unwrap().unwrap();
        assert_eq!(changed.role, UserRole::Author);
        assert!(categories.reviewer_ids(tech.id).await.unwrap().is_empty());

        assert!(repo.set_role(4242, UserRole::Admin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_and_count_by_role() {
        let pool = setup_pool().await;
        let repo = SqlxUserRepository::new(pool.clone());

        seed_user(&pool, "admin1", UserRole::Admin).await;
        seed_user(&pool, "admin2", UserRole::Admin).await;
        seed_user(&pool, "author", UserRole::Author).await;

        let admins = repo.list_by_role(UserRole::Admin).await.unwrap();
        assert_eq!(admins.len(), 2);

        let counts = repo.count_by_role().await.unwrap();
        assert!(counts.contains(&(UserRole::Admin, 2)));
        assert!(counts.contains(&(UserRole::Author, 1)));

        let (page, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(total, 3);
    }
}
