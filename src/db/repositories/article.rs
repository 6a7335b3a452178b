//! Article repository
//!
//! Article persistence outside the workflow. Status changes are never
//! written here; see `workflow::SqlxTransitionStore`.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{
    Article, ArticleQuery, ArticleStatus, Keyword, ListParams, Locale, LocalizedText,
    StatusChange, StatusCounts,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

pub(crate) const ARTICLE_COLUMNS: &str = "id, slug, title_uz, title_ru, title_en, \
     content_uz, content_ru, content_en, author_id, category_id, cover_image, attachment, \
     status, reviewer_id, revision_note, view_count, created_at, updated_at, submitted_at, \
     published_at, (SELECT GROUP_CONCAT(k.name) FROM article_keywords ak \
     JOIN keywords k ON k.id = ak.keyword_id WHERE ak.article_id = articles.id) AS keyword_list";

/// Fields of a new article. Articles always start as drafts.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub slug: String,
    pub title: LocalizedText,
    pub content: LocalizedText,
    pub author_id: i64,
    pub category_id: i64,
    pub cover_image: Option<String>,
    pub attachment: Option<String>,
    /// Normalized keyword names
    pub keywords: Vec<String>,
}

/// Editable fields, applied as a whole
#[derive(Debug, Clone)]
pub struct ArticleContent {
    pub title: LocalizedText,
    pub content: LocalizedText,
    pub category_id: i64,
    pub cover_image: Option<String>,
    pub attachment: Option<String>,
    /// Replaces every keyword of the article
    pub keywords: Vec<String>,
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn create(&self, article: &NewArticle) -> Result<Article>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>>;

    async fn exists_by_slug(&self, slug: &str) -> Result<bool>;

    /// Replace editable content. Only applies while the article is a draft
    /// or has changes requested; returns `None` otherwise.
    async fn update_content(&self, id: i64, content: &ArticleContent) -> Result<Option<Article>>;

    async fn delete_unpublished(&self, id: i64) -> Result<bool>;

    /// Published articles, newest first
    async fn list_published(
        &self,
        params: &ListParams,
        query: &ArticleQuery,
    ) -> Result<(Vec<Article>, i64)>;

    async fn list_by_author(
        &self,
        author_id: i64,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)>;

    async fn list_by_status(
        &self,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)>;

    /// Pending articles assigned to the reviewer, plus unassigned pending
    /// articles in the reviewer's categories. Oldest submission first.
    async fn reviewer_queue(&self, reviewer_id: i64) -> Result<Vec<Article>>;

    async fn count_by_status(&self, author_id: Option<i64>) -> Result<StatusCounts>;

    /// Increment the view counter of a published article
    async fn increment_view_count(&self, id: i64) -> Result<()>;

    /// Reset view counters, returning the number of articles touched
    async fn reset_view_counts(&self, ids: &[i64]) -> Result<u64>;

    /// Workflow history, oldest first
    async fn history(&self, article_id: i64) -> Result<Vec<StatusChange>>;

    /// Keywords used by published articles, most used first, optionally
    /// narrowed to names containing `search`
    async fn keywords(&self, search: Option<&str>, limit: i64) -> Result<Vec<Keyword>>;
}

pub struct SqlxArticleRepository {
    pool: DynDatabasePool,
}

impl SqlxArticleRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ArticleRepository> {
        Arc::new(Self::new(pool))
    }
}

/// Escape LIKE wildcards; `!` is the escape character in every search query
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '!' | '%' | '_') {
            escaped.push('!');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn locale_suffix(locale: Locale) -> &'static str {
    match locale {
        Locale::Uz => "uz",
        Locale::Ru => "ru",
        Locale::En => "en",
    }
}

fn published_where(locale: Locale) -> String {
    let s = locale_suffix(locale);
    format!(
        "status = 'approved' AND (? IS NULL OR category_id = ?) AND (? IS NULL \
         OR title_{s} LIKE ? ESCAPE '!' OR content_{s} LIKE ? ESCAPE '!' \
         OR title_uz LIKE ? ESCAPE '!' OR content_uz LIKE ? ESCAPE '!' \
         OR id IN (SELECT ak.article_id FROM article_keywords ak \
                   JOIN keywords k ON k.id = ak.keyword_id WHERE k.name LIKE ? ESCAPE '!'))"
    )
}

fn search_term(query: &ArticleQuery) -> Option<String> {
    query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(like_pattern)
}

/// Keywords are stored lowercased
fn keyword_term(term: &Option<String>) -> Option<String> {
    term.as_deref().map(str::to_lowercase)
}

fn split_keyword_list(list: Option<String>) -> Vec<String> {
    let mut keywords: Vec<String> = list
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect();
    keywords.sort_unstable();
    keywords
}

async fn replace_keywords_sqlite(
    conn: &mut SqliteConnection,
    article_id: i64,
    keywords: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM article_keywords WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article keywords")?;
    for name in keywords {
        sqlx::query("INSERT OR IGNORE INTO keywords (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to store keyword")?;
        sqlx::query(
            "INSERT OR IGNORE INTO article_keywords (article_id, keyword_id) \
             SELECT ?, id FROM keywords WHERE name = ?",
        )
        .bind(article_id)
        .bind(name)
        .execute(&mut *conn)
        .await
        .context("Failed to link keyword")?;
    }
    Ok(())
}

async fn replace_keywords_mysql(
    conn: &mut MySqlConnection,
    article_id: i64,
    keywords: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM article_keywords WHERE article_id = ?")
        .bind(article_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear article keywords")?;
    for name in keywords {
        sqlx::query("INSERT IGNORE INTO keywords (name, created_at) VALUES (?, ?)")
            .bind(name)
            .bind(Utc::now())
            .execute(&mut *conn)
            .await
            .context("Failed to store keyword")?;
        sqlx::query(
            "INSERT IGNORE INTO article_keywords (article_id, keyword_id) \
             SELECT ?, id FROM keywords WHERE name = ?",
        )
        .bind(article_id)
        .bind(name)
        .execute(&mut *conn)
        .await
        .context("Failed to link keyword")?;
    }
    Ok(())
}

#[async_trait]
impl ArticleRepository for SqlxArticleRepository {
    async fn create(&self, article: &NewArticle) -> Result<Article> {
        let sql = r#"
            INSERT INTO articles (slug, title_uz, title_ru, title_en, content_uz, content_ru,
                                  content_en, author_id, category_id, cover_image, attachment,
                                  status, view_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'draft', 0, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let id = sqlx::query(sql)
                    .bind(&article.slug)
                    .bind(&article.title.uz)
                    .bind(&article.title.ru)
                    .bind(&article.title.en)
                    .bind(&article.content.uz)
                    .bind(&article.content.ru)
                    .bind(&article.content.en)
                    .bind(article.author_id)
                    .bind(article.category_id)
                    .bind(&article.cover_image)
                    .bind(&article.attachment)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create article")?
                    .last_insert_rowid();
                replace_keywords_sqlite(&mut *tx, id, &article.keywords).await?;
                tx.commit().await?;
                id
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await?;
                let id = sqlx::query(sql)
                    .bind(&article.slug)
                    .bind(&article.title.uz)
                    .bind(&article.title.ru)
                    .bind(&article.title.en)
                    .bind(&article.content.uz)
                    .bind(&article.content.ru)
                    .bind(&article.content.en)
                    .bind(article.author_id)
                    .bind(article.category_id)
                    .bind(&article.cover_image)
                    .bind(&article.attachment)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to create article")?
                    .last_insert_id() as i64;
                replace_keywords_mysql(&mut *tx, id, &article.keywords).await?;
                tx.commit().await?;
                id
            }
        };

        self.get_by_id(id)
            .await?
            .context("Article not found after insert")
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get article")?
                .as_ref()
                .map(row_to_article_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get article")?
                .as_ref()
                .map(row_to_article_mysql)
                .transpose(),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE slug = ?");
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get article by slug")?
                .as_ref()
                .map(row_to_article_sqlite)
                .transpose(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .context("Failed to get article by slug")?
                .as_ref()
                .map(row_to_article_mysql)
                .transpose(),
        }
    }

    async fn exists_by_slug(&self, slug: &str) -> Result<bool> {
        let sql = "SELECT 1 AS hit FROM articles WHERE slug = ?";
        let found = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .map(|r| r.is_some()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(slug)
                .fetch_optional(pool)
                .await
                .map(|r| r.is_some()),
        }
        .context("Failed to check article slug")?;

        Ok(found)
    }

    async fn update_content(&self, id: i64, content: &ArticleContent) -> Result<Option<Article>> {
        let sql = r#"
            UPDATE articles
            SET title_uz = ?, title_ru = ?, title_en = ?, content_uz = ?, content_ru = ?,
                content_en = ?, category_id = ?, cover_image = ?, attachment = ?, updated_at = ?
            WHERE id = ? AND status IN ('draft', 'changes_requested')
        "#;
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                let affected = sqlx::query(sql)
                    .bind(&content.title.uz)
                    .bind(&content.title.ru)
                    .bind(&content.title.en)
                    .bind(&content.content.uz)
                    .bind(&content.content.ru)
                    .bind(&content.content.en)
                    .bind(content.category_id)
                    .bind(&content.cover_image)
                    .bind(&content.attachment)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update article")?
                    .rows_affected();
                if affected > 0 {
                    replace_keywords_sqlite(&mut *tx, id, &content.keywords).await?;
                }
                tx.commit().await?;
                affected
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await?;
                let affected = sqlx::query(sql)
                    .bind(&content.title.uz)
                    .bind(&content.title.ru)
                    .bind(&content.title.en)
                    .bind(&content.content.uz)
                    .bind(&content.content.ru)
                    .bind(&content.content.en)
                    .bind(content.category_id)
                    .bind(&content.cover_image)
                    .bind(&content.attachment)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to update article")?
                    .rows_affected();
                if affected > 0 {
                    replace_keywords_mysql(&mut *tx, id, &content.keywords).await?;
                }
                tx.commit().await?;
                affected
            }
        };

        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete_unpublished(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM articles WHERE id = ? AND status <> 'approved'";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to delete article")?;

        Ok(affected > 0)
    }

    async fn list_published(
        &self,
        params: &ListParams,
        query: &ArticleQuery,
    ) -> Result<(Vec<Article>, i64)> {
        let filter = published_where(query.locale);
        let list_sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} \
             ORDER BY published_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM articles WHERE {filter}");
        let term = search_term(query);
        let keyword = keyword_term(&term);
        let category = query.category_id;

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(category)
                    .bind(category)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&keyword)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list published articles")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(category)
                    .bind(category)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&keyword)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count published articles")?
                    .get("count");
                let articles = rows.iter().map(row_to_article_sqlite).collect::<Result<_>>()?;
                Ok((articles, total))
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(category)
                    .bind(category)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&keyword)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list published articles")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(category)
                    .bind(category)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&term)
                    .bind(&keyword)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count published articles")?
                    .get("count");
                let articles = rows.iter().map(row_to_article_mysql).collect::<Result<_>>()?;
                Ok((articles, total))
            }
        }
    }

    async fn list_by_author(
        &self,
        author_id: i64,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)> {
        self.list_filtered(Some(author_id), status, params).await
    }

    async fn list_by_status(
        &self,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)> {
        self.list_filtered(None, status, params).await
    }

    async fn reviewer_queue(&self, reviewer_id: i64) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE status = 'pending_review' AND (reviewer_id = ? OR (reviewer_id IS NULL \
             AND category_id IN (SELECT category_id FROM category_reviewers WHERE user_id = ?))) \
             ORDER BY submitted_at ASC, id ASC"
        );
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(reviewer_id)
                .bind(reviewer_id)
                .fetch_all(pool)
                .await
                .context("Failed to load reviewer queue")?
                .iter()
                .map(row_to_article_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(reviewer_id)
                .bind(reviewer_id)
                .fetch_all(pool)
                .await
                .context("Failed to load reviewer queue")?
                .iter()
                .map(row_to_article_mysql)
                .collect(),
        }
    }

    async fn count_by_status(&self, author_id: Option<i64>) -> Result<StatusCounts> {
        let sql = "SELECT status, COUNT(*) AS count FROM articles \
                   WHERE (? IS NULL OR author_id = ?) GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(author_id)
                .bind(author_id)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(|r| (r.get("status"), r.get("count"))).collect()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(author_id)
                .bind(author_id)
                .fetch_all(pool)
                .await
                .map(|rows| rows.iter().map(|r| (r.get("status"), r.get("count"))).collect()),
        }
        .context("Failed to count articles by status")?;

        let mut counts = StatusCounts::default();
        for (status, count) in pairs {
            if let Some(status) = ArticleStatus::from_str(&status) {
                counts.set(status, count);
            }
        }
        Ok(counts)
    }

    async fn increment_view_count(&self, id: i64) -> Result<()> {
        let sql = "UPDATE articles SET view_count = view_count + 1 WHERE id = ? AND status = 'approved'";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await.map(|_| ()),
        }
        .context("Failed to increment view count")
    }

    async fn reset_view_counts(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("UPDATE articles SET view_count = 0 WHERE id IN ({placeholders})");

        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query.execute(pool).await.map(|r| r.rows_affected())
            }
            Backend::Mysql(pool) => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query.execute(pool).await.map(|r| r.rows_affected())
            }
        }
        .context("Failed to reset view counts")?;

        Ok(affected)
    }

    async fn history(&self, article_id: i64) -> Result<Vec<StatusChange>> {
        let sql = "SELECT id, article_id, from_status, to_status, actor_id, comment, created_at \
                   FROM article_status_history WHERE article_id = ? ORDER BY id ASC";
        match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to load status history")?
                .iter()
                .map(row_to_status_change_sqlite)
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(article_id)
                .fetch_all(pool)
                .await
                .context("Failed to load status history")?
                .iter()
                .map(row_to_status_change_mysql)
                .collect(),
        }
    }

    async fn keywords(&self, search: Option<&str>, limit: i64) -> Result<Vec<Keyword>> {
        let sql = "SELECT k.id, k.name, COUNT(a.id) AS article_count FROM keywords k \
                   JOIN article_keywords ak ON ak.keyword_id = k.id \
                   JOIN articles a ON a.id = ak.article_id AND a.status = 'approved' \
                   WHERE (? IS NULL OR k.name LIKE ? ESCAPE '!') \
                   GROUP BY k.id, k.name ORDER BY article_count DESC, k.name ASC LIMIT ?";
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| like_pattern(&s.to_lowercase()));

        let rows: Vec<(i64, String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .map(|rows| {
                    rows.iter()
                        .map(|r| (r.get("id"), r.get("name"), r.get("article_count")))
                        .collect()
                }),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&pattern)
                .bind(&pattern)
                .bind(limit)
                .fetch_all(pool)
                .await
                .map(|rows| {
                    rows.iter()
                        .map(|r| (r.get("id"), r.get("name"), r.get("article_count")))
                        .collect()
                }),
        }
        .context("Failed to list keywords")?;

        Ok(rows
            .into_iter()
            .map(|(id, name, article_count)| Keyword {
                id,
                name,
                article_count,
            })
            .collect())
    }
}

impl SqlxArticleRepository {
    /// Paged listing, optionally narrowed to an author and a status
    async fn list_filtered(
        &self,
        author_id: Option<i64>,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(Vec<Article>, i64)> {
        let filter = "(? IS NULL OR author_id = ?) AND (? IS NULL OR status = ?)";
        let list_sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {filter} \
             ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM articles WHERE {filter}");
        let status = status.map(|s| s.as_str());

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(author_id)
                    .bind(author_id)
                    .bind(status)
                    .bind(status)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(author_id)
                    .bind(author_id)
                    .bind(status)
                    .bind(status)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count articles")?
                    .get("count");
                let articles = rows.iter().map(row_to_article_sqlite).collect::<Result<_>>()?;
                Ok((articles, total))
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(author_id)
                    .bind(author_id)
                    .bind(status)
                    .bind(status)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list articles")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(author_id)
                    .bind(author_id)
                    .bind(status)
                    .bind(status)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count articles")?
                    .get("count");
                let articles = rows.iter().map(row_to_article_mysql).collect::<Result<_>>()?;
                Ok((articles, total))
            }
        }
    }
}

fn parse_status(raw: &str) -> Result<ArticleStatus> {
    ArticleStatus::from_str(raw).with_context(|| format!("Unknown article status: {}", raw))
}

pub(crate) fn row_to_article_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Article> {
    let status: String = row.get("status");
    Ok(Article {
        id: row.get("id"),
        slug: row.get("slug"),
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
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        cover_image: row.get("cover_image"),
        attachment: row.get("attachment"),
        keywords: split_keyword_list(row.get("keyword_list")),
        status: parse_status(&status)?,
        reviewer_id: row.get("reviewer_id"),
        revision_note: row.get("revision_note"),
        view_count: row.get("view_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        submitted_at: row.get("submitted_at"),
        published_at: row.get("published_at"),
    })
}

pub(crate) fn row_to_article_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Article> {
    let status: String = row.get("status");
    Ok(Article {
        id: row.get("id"),
        slug: row.get("slug"),
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
        author_id: row.get("author_id"),
        category_id: row.get("category_id"),
        cover_image: row.get("cover_image"),
        attachment: row.get("attachment"),
        keywords: split_keyword_list(row.get("keyword_list")),
        status: parse_status(&status)?,
        reviewer_id: row.get("reviewer_id"),
        revision_note: row.get("revision_note"),
        view_count: row.get("view_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        submitted_at: row.get("submitted_at"),
        published_at: row.get("published_at"),
    })
}

fn row_to_status_change_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<StatusChange> {
    let from: String = row.get("from_status");
    let to: String = row.get("to_status");
    Ok(StatusChange {
        id: row.get("id"),
        article_id: row.get("article_id"),
        from_status: parse_status(&from)?,
        to_status: parse_status(&to)?,
        actor_id: row.get("actor_id"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

fn row_to_status_change_mysql(row: &sqlx::mysql::MySqlRow) -> Result<StatusChange> {
    let from: String = row.get("from_status");
    let to: String = row.get("to_status");
    Ok(StatusChange {
        id: row.get("id"),
        article_id: row.get("article_id"),
        from_status: parse_status(&from)?,
        to_status: parse_status(&to)?,
        actor_id: row.get("actor_id"),
        comment: row.get("comment"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{
        force_status, seed_article, seed_category, seed_user, setup_pool,
    };
    use crate::models::UserRole;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("rust"), "%rust%");
        assert_eq!(like_pattern("50%_off!"), "%50!%!_off!!%");
    }

    #[tokio::test]
    async fn test_create_starts_as_draft() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let article = seed_article(&pool, author.id, tech.id, "salom-dunyo").await;
        assert_eq!(article.status, ArticleStatus::Draft);
        assert_eq!(article.view_count, 0);
        assert!(article.reviewer_id.is_none());
        assert!(repo.exists_by_slug("salom-dunyo").await.unwrap());
        assert_eq!(
            repo.get_by_slug("salom-dunyo").await.unwrap().unwrap().id,
            article.id
        );
    }

    #[tokio::test]
    async fn test_update_content_only_when_editable() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());
        let article = seed_article(&pool, author.id, tech.id, "maqola").await;

        let content = ArticleContent {
            title: LocalizedText::new("Yangi sarlavha").with_en("New title"),
            content: LocalizedText::new("Yangi matn"),
            category_id: tech.id,
            cover_image: None,
            attachment: Some("/media/attachments/qo'lyozma.pdf".to_string()),
            keywords: vec!["rust".to_string(), "async".to_string()],
        };
        let updated = repo.update_content(article.id, &content).await.unwrap().unwrap();
        assert_eq!(updated.title.en.as_deref(), Some("New title"));
        assert_eq!(updated.slug, "maqola");
        assert_eq!(updated.keywords, vec!["async", "rust"]);
        assert!(updated.attachment.is_some());

        force_status(&pool, article.id, ArticleStatus::PendingReview).await;
        assert!(repo.update_content(article.id, &content).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_published_articles_cannot_be_deleted() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let draft = seed_article(&pool, author.id, tech.id, "qoralama").await;
        let published = seed_article(&pool, author.id, tech.id, "nashr").await;
        force_status(&pool, published.id, ArticleStatus::Approved).await;

        assert!(repo.delete_unpublished(draft.id).await.unwrap());
        assert!(!repo.delete_unpublished(published.id).await.unwrap());
        assert!(repo.get_by_id(published.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_published_filters_and_searches() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let sport = seed_category(&pool, "sport").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let a = seed_article(&pool, author.id, tech.id, "rust-haqida").await;
        let b = seed_article(&pool, author.id, sport.id, "futbol").await;
        seed_article(&pool, author.id, tech.id, "qoralama").await;
        force_status(&pool, a.id, ArticleStatus::Approved).await;
        force_status(&pool, b.id, ArticleStatus::Approved).await;

        let params = ListParams::default();
        let (all, total) = repo
            .list_published(&params, &ArticleQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);

        let by_category = ArticleQuery {
            category_id: Some(tech.id),
            ..Default::default()
        };
        let (items, _) = repo.list_published(&params, &by_category).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, a.id);

        let search = ArticleQuery {
            search: Some("futbol".to_string()),
            locale: Locale::En,
            ..Default::default()
        };
        let (items, total) = repo.list_published(&params, &search).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, b.id);
    }

    #[tokio::test]
    async fn test_counts_and_views() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let a = seed_article(&pool, author.id, tech.id, "bir").await;
        seed_article(&pool, author.id, tech.id, "ikki").await;
        force_status(&pool, a.id, ArticleStatus::Approved).await;

        let counts = repo.count_by_status(Some(author.id)).await.unwrap();
        assert_eq!(counts.draft, 1);
        assert_eq!(counts.approved, 1);
        assert_eq!(repo.count_by_status(Some(9999)).await.unwrap().total(), 0);

        repo.increment_view_count(a.id).await.unwrap();
        repo.increment_view_count(a.id).await.unwrap();
        assert_eq!(repo.get_by_id(a.id).await.unwrap().unwrap().view_count, 2);

        assert_eq!(repo.reset_view_counts(&[a.id]).await.unwrap(), 1);
        assert_eq!(repo.get_by_id(a.id).await.unwrap().unwrap().view_count, 0);
        assert_eq!(repo.reset_view_counts(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_by_author_and_status() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let other = seed_user(&pool, "bekzod", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let a = seed_article(&pool, author.id, tech.id, "bir").await;
        seed_article(&pool, author.id, tech.id, "ikki").await;
        seed_article(&pool, other.id, tech.id, "uch").await;
        force_status(&pool, a.id, ArticleStatus::PendingReview).await;

        let params = ListParams::default();
        let (mine, total) = repo.list_by_author(author.id, None, &params).await.unwrap();
        assert_eq!(total, 2);
        assert!(mine.iter().all(|x| x.author_id == author.id));

        let (pending, _) = repo
            .list_by_author(author.id, Some(ArticleStatus::PendingReview), &params)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let (all_pending, total) = repo
            .list_by_status(Some(ArticleStatus::PendingReview), &params)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(all_pending[0].id, a.id);

        let (everything, total) = repo.list_by_status(None, &params).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(everything.len(), 3);
    }

    async fn keyworded_article(
        pool: &DynDatabasePool,
        author_id: i64,
        category_id: i64,
        slug: &str,
        keywords: &[&str],
    ) -> Article {
        SqlxArticleRepository::new(pool.clone())
            .create(&NewArticle {
                slug: slug.to_string(),
                title: LocalizedText::new(slug),
                content: LocalizedText::new("Matn"),
                author_id,
                category_id,
                cover_image: None,
                attachment: None,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_keywords_are_shared_and_replaced() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let a = keyworded_article(&pool, author.id, tech.id, "bir", &["tarix", "fan"]).await;
        let b = keyworded_article(&pool, author.id, tech.id, "ikki", &["fan"]).await;
        assert_eq!(a.keywords, vec!["fan", "tarix"]);
        assert_eq!(b.keywords, vec!["fan"]);

        let stored: i64 = sqlx::query("SELECT COUNT(*) AS count FROM keywords")
            .fetch_one(pool.as_sqlite().unwrap())
            .await
            .unwrap()
            .get("count");
        assert_eq!(stored, 2);

        let content = ArticleContent {
            title: a.title.clone(),
            content: a.content.clone(),
            category_id: tech.id,
            cover_image: None,
            attachment: None,
            keywords: Vec::new(),
        };
        let cleared = repo.update_content(a.id, &content).await.unwrap().unwrap();
        assert!(cleared.keywords.is_empty());
        assert_eq!(
            repo.get_by_id(b.id).await.unwrap().unwrap().keywords,
            vec!["fan"]
        );
    }

    #[tokio::test]
    async fn test_search_matches_keywords() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let repo = SqlxArticleRepository::new(pool.clone());

        let a = keyworded_article(&pool, author.id, tech.id, "bir", &["kvant fizikasi"]).await;
        let b = keyworded_article(&pool, author.id, tech.id, "ikki", &["kvant fizikasi"]).await;
        keyworded_article(&pool, author.id, tech.id, "uch", &["tarix"]).await;
        force_status(&pool, a.id, ArticleStatus::Approved).await;

        let search = ArticleQuery {
            search: Some("KVANT".to_string()),
            ..Default::default()
        };
        let (items, total) = repo
            .list_published(&ListParams::default(), &search)
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(items[0].id, a.id);

        force_status(&pool, b.id, ArticleStatus::Approved).await;
        let keywords = repo.keywords(None, 10).await.unwrap();
        assert_eq!(keywords.len(), 1);
        assert_eq!(keywords[0].name, "kvant fizikasi");
        assert_eq!(keywords[0].article_count, 2);
        assert!(repo.keywords(Some("tar"), 10).await.unwrap().is_empty());
    }
}
