//! Article rules repository
//!
//! Rules versions are immutable once created; only the active flag moves.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ArticleRules, LocalizedText};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

const RULES_COLUMNS: &str = "id, version, title_uz, title_ru, title_en, content_uz, content_ru, \
     content_en, is_active, created_at, updated_at";

#[async_trait]
pub trait RulesRepository: Send + Sync {
    /// Store a new version numbered after the latest one, optionally
    /// making it the active version.
    async fn create(
        &self,
        title: &LocalizedText,
        content: &LocalizedText,
        activate: bool,
    ) -> Result<ArticleRules>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleRules>>;

    async fn get_active(&self) -> Result<Option<ArticleRules>>;

    /// All versions, newest first
    async fn list(&self) -> Result<Vec<ArticleRules>>;

    /// Make `id` the only active version. Returns `None` if it does not exist.
    async fn activate(&self, id: i64) -> Result<Option<ArticleRules>>;
}

pub struct SqlxRulesRepository {
    pool: DynDatabasePool,
}

impl SqlxRulesRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn RulesRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl RulesRepository for SqlxRulesRepository {
    async fn create(
        &self,
        title: &LocalizedText,
        content: &LocalizedText,
        activate: bool,
    ) -> Result<ArticleRules> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_rules_sqlite(pool, title, content, activate).await?,
            Backend::Mysql(pool) => create_rules_mysql(pool, title, content, activate).await?,
        };

        self.get_by_id(id)
            .await?
            .context("Rules not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ArticleRules>> {
        let sql = format!("SELECT {RULES_COLUMNS} FROM article_rules WHERE id = ?");
        let rules = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| row.as_ref().map(row_to_rules_sqlite)),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .map(|row| row.as_ref().map(row_to_rules_mysql)),
        }
        .context("Failed to get rules")?;

        Ok(rules)
    }

    async fn get_active(&self) -> Result<Option<ArticleRules>> {
        let sql = format!(
            "SELECT {RULES_COLUMNS} FROM article_rules WHERE is_active = TRUE \
             ORDER BY version DESC LIMIT 1"
        );
        let rules = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_optional(pool)
                .await
                .map(|row| row.as_ref().map(row_to_rules_sqlite)),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_optional(pool)
                .await
                .map(|row| row.as_ref().map(row_to_rules_mysql)),
        }
        .context("Failed to get active rules")?;

        Ok(rules)
    }

    async fn list(&self) -> Result<Vec<ArticleRules>> {
        let sql = format!("SELECT {RULES_COLUMNS} FROM article_rules ORDER BY version DESC");
        let rules = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(row_to_rules_sqlite).collect()),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(row_to_rules_mysql).collect()),
        }
        .context("Failed to list rules")?;

        Ok(rules)
    }

    async fn activate(&self, id: i64) -> Result<Option<ArticleRules>> {
        let found = match self.pool.backend() {
            Backend::Sqlite(pool) => activate_rules_sqlite(pool, id).await?,
            Backend::Mysql(pool) => activate_rules_mysql(pool, id).await?,
        };
        if !found {
            return Ok(None);
        }
        self.get_by_id(id).await
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_rules_sqlite(
    pool: &SqlitePool,
    title: &LocalizedText,
    content: &LocalizedText,
    activate: bool,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let version: i64 =
        sqlx::query("SELECT COALESCE(MAX(version), 0) + 1 AS next FROM article_rules")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to compute rules version")?
            .get("next");

    if activate {
        sqlx::query("UPDATE article_rules SET is_active = FALSE, updated_at = ? WHERE is_active = TRUE")
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to deactivate rules")?;
    }

    let id = sqlx::query(
        r#"
        INSERT INTO article_rules (version, title_uz, title_ru, title_en, content_uz,
                                   content_ru, content_en, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(version)
    .bind(&title.uz)
    .bind(&title.ru)
    .bind(&title.en)
    .bind(&content.uz)
    .bind(&content.ru)
    .bind(&content.en)
    .bind(activate)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create rules")?
    .last_insert_rowid();

    tx.commit().await?;
    Ok(id)
}

async fn activate_rules_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let exists = sqlx::query("SELECT id FROM article_rules WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("UPDATE article_rules SET is_active = (id = ?), updated_at = ?")
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to activate rules")?;

    tx.commit().await?;
    Ok(true)
}

fn row_to_rules_sqlite(row: &sqlx::sqlite::SqliteRow) -> ArticleRules {
    ArticleRules {
        id: row.get("id"),
        version: row.get("version"),
        title: LocalizedText {
            uz: row.get("title_uz"),
            ru: row.get("title_ru"),
            en: row.get("title_en"),
        },
        content: LocalizedText {
            uz: row.get("content_uz"),
            ru: row.get("content_ru"),
            en: row.get("content_en"),
        },
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_rules_mysql(
    pool: &MySqlPool,
    title: &LocalizedText,
    content: &LocalizedText,
    activate: bool,
) -> Result<i64> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let version: i64 = sqlx::query(
        "SELECT CAST(COALESCE(MAX(version), 0) + 1 AS SIGNED) AS next FROM article_rules FOR UPDATE",
    )
    .fetch_one(&mut *tx)
    .await
    .context("Failed to compute rules version")?
    .get("next");

    if activate {
        sqlx::query("UPDATE article_rules SET is_active = FALSE, updated_at = ? WHERE is_active = TRUE")
            .bind(now)
            .execute(&mut *tx)
            .await
            .context("Failed to deactivate rules")?;
    }

    let id = sqlx::query(
        r#"
        INSERT INTO article_rules (version, title_uz, title_ru, title_en, content_uz,
                                   content_ru, content_en, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(version)
    .bind(&title.uz)
    .bind(&title.ru)
    .bind(&title.en)
    .bind(&content.uz)
    .bind(&content.ru)
    .bind(&content.en)
    .bind(activate)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .context("Failed to create rules")?
    .last_insert_id() as i64;

    tx.commit().await?;
    Ok(id)
}

async fn activate_rules_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let exists = sqlx::query("SELECT id FROM article_rules WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .is_some();
    if !exists {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query("UPDATE article_rules SET is_active = (id = ?), updated_at = ?")
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to activate rules")?;

    tx.commit().await?;
    Ok(true)
}

fn row_to_rules_mysql(row: &sqlx::mysql::MySqlRow) -> ArticleRules {
    ArticleRules {
        id: row.get("id"),
        version: row.get("version"),
        title: LocalizedText {
            uz: row.get("title_uz"),
            ru: row.get("title_ru"),
            en: row.get("title_en"),
        },
        content: LocalizedText {
            uz: row.get("content_uz"),
            ru: row.get("content_ru"),
            en: row.get("content_en"),
        },
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::setup_pool;

    fn text(uz: &str) -> LocalizedText {
        LocalizedText::new(uz)
    }

    #[tokio::test]
    async fn test_versions_increase() {
        let pool = setup_pool().await;
        let repo = SqlxRulesRepository::new(pool);

        let v1 = repo.create(&text("Qoidalar"), &text("Matn"), false).await.unwrap();
        let v2 = repo.create(&text("Qoidalar 2"), &text("Matn 2"), false).await.unwrap();
        assert_eq!(v1.version, 1);
        assert_eq!(v2.version, 2);
        assert!(repo.get_active().await.unwrap().is_none());

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.iter().map(|r| r.version).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_single_active_version() {
        let pool = setup_pool().await;
        let repo = SqlxRulesRepository::new(pool);

        let v1 = repo.create(&text("v1"), &text("a"), true).await.unwrap();
        assert!(v1.is_active);
        let v2 = repo.create(&text("v2"), &text("b"), true).await.unwrap();
        assert_eq!(repo.get_active().await.unwrap().unwrap().id, v2.id);
        assert!(!repo.get_by_id(v1.id).await.unwrap().unwrap().is_active);

        let reactivated = repo.activate(v1.id).await.unwrap().unwrap();
        assert!(reactivated.is_active);
        assert!(!repo.get_by_id(v2.id).await.unwrap().unwrap().is_active);
        assert_eq!(repo.list().await.unwrap().iter().filter(|r| r.is_active).count(), 1);

        assert!(repo.activate(9999).await.unwrap().is_none());
    }
}
