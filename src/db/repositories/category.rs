//! Category repository
//!
//! Categories and the `category_reviewers` assignment table.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Category, LocalizedText};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

const CATEGORY_COLUMNS: &str =
    "id, slug, name_uz, name_ru, name_en, description, is_active, created_at";

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn create(
        &self,
        slug: &str,
        name: &LocalizedText,
        description: Option<&str>,
    ) -> Result<Category>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>>;

    /// Persist name, description and active flag
    async fn update(&self, category: &Category) -> Result<Category>;

    async fn list(&self, include_inactive: bool) -> Result<Vec<Category>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Assign a reviewer; assigning twice is a no-op
    async fn add_reviewer(&self, category_id: i64, user_id: i64) -> Result<bool>;

    async fn remove_reviewer(&self, category_id: i64, user_id: i64) -> Result<bool>;

    /// IDs of users assigned to review `category_id`
    async fn reviewer_ids(&self, category_id: i64) -> Result<Vec<i64>>;

    /// Categories a reviewer is assigned to
    async fn categories_for_reviewer(&self, user_id: i64) -> Result<Vec<Category>>;

    async fn is_reviewer_assigned(&self, category_id: i64, user_id: i64) -> Result<bool>;
}

pub struct SqlxCategoryRepository {
    pool: DynDatabasePool,
}

impl SqlxCategoryRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CategoryRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl CategoryRepository for SqlxCategoryRepository {
    async fn create(
        &self,
        slug: &str,
        name: &LocalizedText,
        description: Option<&str>,
    ) -> Result<Category> {
        let sql = r#"
            INSERT INTO categories (slug, name_uz, name_ru, name_en, description, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, TRUE, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(slug)
                .bind(&name.uz)
                .bind(&name.ru)
                .bind(&name.en)
                .bind(description)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create category")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(slug)
                .bind(&name.uz)
                .bind(&name.ru)
                .bind(&name.en)
                .bind(description)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create category")?
                .last_insert_id() as i64,
        };

        self.get_by_id(id)
            .await?
            .context("Category not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get category")?
                .as_ref()
                .map(row_to_category_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get category")?
                .as_ref()
                .map(row_to_category_mysql)
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Category>> {
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get category by slug")?
                .as_ref()
                .map(row_to_category_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get category by slug")?
                .as_ref()
                .map(row_to_category_mysql)
                .transpose(),
        }
    }

    async fn update(&self, category: &Category) -> Result<Category> {
        let sql = r#"
            UPDATE categories
            SET name_uz = ?, name_ru = ?, name_en = ?, description = ?, is_active = ?
            WHERE id = ?
        "#;
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&category.name.uz)
                .bind(&category.name.ru)
                .bind(&category.name.en)
                .bind(&category.description)
                .bind(category.is_active)
                .bind(category.id)
                .execute(pool)
                .await
                .map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&category.name.uz)
                .bind(&category.name.ru)
                .bind(&category.name.en)
                .bind(&category.description)
                .bind(category.is_active)
                .bind(category.id)
                .execute(pool)
                .await
                .map(|_| ()),
        }
        .context("Failed to update category")?;

        self.get_by_id(category.id)
            .await?
            .context("Category not found after update")
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Category>> {
        let sql = if include_inactive {
            format!("SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name_uz")
        } else {
            format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE is_active = TRUE ORDER BY name_uz")
        };
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list categories")?
                .iter()
                .map(row_to_category_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list categories")?
                .iter()
                .map(row_to_category_mysql)
                .collect(),
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        Ok(self.get_by_slug(slug).await?.is_some())
    }

    async fn add_reviewer(&self, category_id: i64, user_id: i64) -> Result<bool> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(
                "INSERT OR IGNORE INTO category_reviewers (category_id, user_id) VALUES (?, ?)",
            )
            .bind(category_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(
                "INSERT IGNORE INTO category_reviewers (category_id, user_id) VALUES (?, ?)",
            )
            .bind(category_id)
            .bind(user_id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
        }
        .context("Failed to assign reviewer to category")?;

        Ok(affected > 0)
    }

    async fn remove_reviewer(&self, category_id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM category_reviewers WHERE category_id = ? AND user_id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(category_id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(category_id)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to remove reviewer from category")?;

        Ok(affected > 0)
    }

    async fn reviewer_ids(&self, category_id: i64) -> Result<Vec<i64>> {
        let sql = "SELECT user_id FROM category_reviewers WHERE category_id = ? ORDER BY user_id";
        let ids: Vec<i64> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(category_id)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(|r| r.get("user_id")).collect()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(category_id)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(|r| r.get("user_id")).collect()),
        }
        .context("Failed to list category reviewers")?;

        Ok(ids)
    }

    async fn categories_for_reviewer(&self, user_id: i64) -> Result<Vec<Category>> {
        let sql = r#"
            SELECT c.id, c.slug, c.name_uz, c.name_ru, c.name_en, c.description, c.is_active, c.created_at
            FROM categories c
            INNER JOIN category_reviewers cr ON cr.category_id = c.id
            WHERE cr.user_id = ?
            ORDER BY c.name_uz
        "#;
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list reviewer categories")?
                .iter()
                .map(row_to_category_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .fetch_all(pool)
                .await
                .context("Failed to list reviewer categories")?
                .iter()
                .map(row_to_category_mysql)
                .collect(),
        }
    }

    async fn is_reviewer_assigned(&self, category_id: i64, user_id: i64) -> Result<bool> {
        let sql = "SELECT 1 AS hit FROM category_reviewers WHERE category_id = ? AND user_id = ?";
        let found = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(category_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map(|r| r.is_some()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(category_id)
                .bind(user_id)
                .fetch_optional(pool)
                .await
                .map(|r| r.is_some()),
        }
        .context("Failed to check reviewer assignment")?;

        Ok(found)
    }
}

fn row_to_category_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        slug: row.get("slug"),
        name: LocalizedText {
            uz: row.get("name_uz"),
            ru: row.get("name_ru"),
            en: row.get("name_en"),
        },
        description: row.get("description"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}

fn row_to_category_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Category> {
    Ok(Category {
        id: row.get("id"),
        slug: row.get("slug"),
        name: LocalizedText {
            uz: row.get("name_uz"),
            ru: row.get("name_ru"),
            en: row.get("name_en"),
        },
        description: row.get("description"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    })
}
