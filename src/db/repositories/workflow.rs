//! Workflow transition store
//!
//! Applies one article status transition as a single unit of work: the
//! compare-and-set update of the article row, the status history entry and
//! every notification record commit together or not at all.

use super::article::{row_to_article_mysql, row_to_article_sqlite, ARTICLE_COLUMNS};
use super::notification::{insert_notification_mysql, insert_notification_sqlite, stored};
use crate::db::{Backend, DynDatabasePool};
use crate::models::{Article, ArticleStatus, NewNotification, Notification};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, SqlitePool};
use std::sync::Arc;

/// A fully computed transition. `from_status` and `observed_reviewer` are
/// what the caller saw when it made its decision; the row is only written
/// if both still hold.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub article_id: i64,
    pub actor_id: i64,
    pub from_status: ArticleStatus,
    pub observed_reviewer: Option<i64>,
    pub to_status: ArticleStatus,
    pub reviewer_id: Option<i64>,
    pub revision_note: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    /// Recorded in the status history
    pub comment: Option<String>,
}

/// Result of a committed transition
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub article: Article,
    pub notifications: Vec<Notification>,
}

#[async_trait]
pub trait TransitionStore: Send + Sync {
    /// Apply `transition` and record `notifications` atomically.
    ///
    /// Returns `None` when the article no longer matches the observed
    /// status and reviewer; nothing is written in that case.
    async fn apply(
        &self,
        transition: &Transition,
        notifications: &[NewNotification],
    ) -> Result<Option<TransitionOutcome>>;
}

pub struct SqlxTransitionStore {
    pool: DynDatabasePool,
}

impl SqlxTransitionStore {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TransitionStore> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TransitionStore for SqlxTransitionStore {
    async fn apply(
        &self,
        transition: &Transition,
        notifications: &[NewNotification],
    ) -> Result<Option<TransitionOutcome>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => apply_sqlite(pool, transition, notifications).await,
            Backend::Mysql(pool) => apply_mysql(pool, transition, notifications).await,
        }
    }
}

const INSERT_HISTORY: &str = r#"
    INSERT INTO article_status_history (article_id, from_status, to_status, actor_id, comment, created_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

fn compare_and_set_sql(null_safe_eq: &str) -> String {
    format!(
        "UPDATE articles SET status = ?, reviewer_id = ?, revision_note = ?, submitted_at = ?, \
         published_at = ?, updated_at = ? \
         WHERE id = ? AND status = ? AND reviewer_id {null_safe_eq} ?"
    )
}

// ============================================================================
// SQLite implementation
// ============================================================================

async fn apply_sqlite(
    pool: &SqlitePool,
    t: &Transition,
    notifications: &[NewNotification],
) -> Result<Option<TransitionOutcome>> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let affected = sqlx::query(&compare_and_set_sql("IS"))
        .bind(t.to_status.as_str())
        .bind(t.reviewer_id)
        .bind(&t.revision_note)
        .bind(t.submitted_at)
        .bind(t.published_at)
        .bind(now)
        .bind(t.article_id)
        .bind(t.from_status.as_str())
        .bind(t.observed_reviewer)
        .execute(&mut *tx)
        .await
        .context("Failed to update article status")?
        .rows_affected();

    if affected == 0 {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query(INSERT_HISTORY)
        .bind(t.article_id)
        .bind(t.from_status.as_str())
        .bind(t.to_status.as_str())
        .bind(t.actor_id)
        .bind(&t.comment)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to record status change")?;

    let mut recorded = Vec::with_capacity(notifications.len());
    for n in notifications {
        let id = insert_notification_sqlite(&mut *tx, n, now).await?;
        recorded.push(stored(id, n, now));
    }

    let row = sqlx::query(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"))
        .bind(t.article_id)
        .fetch_one(&mut *tx)
        .await
        .context("Article not found after transition")?;
    let article = row_to_article_sqlite(&row)?;

    tx.commit().await?;
    Ok(Some(TransitionOutcome {
        article,
        notifications: recorded,
    }))
}

// ============================================================================
// MySQL implementation
// ============================================================================

async fn apply_mysql(
    pool: &MySqlPool,
    t: &Transition,
    notifications: &[NewNotification],
) -> Result<Option<TransitionOutcome>> {
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // Lock the row first: MySQL counts matched-but-unchanged rows as unaffected
    let current = sqlx::query(
        "SELECT id FROM articles WHERE id = ? AND status = ? AND reviewer_id <=> ? FOR UPDATE",
    )
    .bind(t.article_id)
    .bind(t.from_status.as_str())
    .bind(t.observed_reviewer)
    .fetch_optional(&mut *tx)
    .await
    .context("Failed to lock article")?;

    if current.is_none() {
        tx.rollback().await?;
        return Ok(None);
    }

    sqlx::query(&compare_and_set_sql("<=>"))
        .bind(t.to_status.as_str())
        .bind(t.reviewer_id)
        .bind(&t.revision_note)
        .bind(t.submitted_at)
        .bind(t.published_at)
        .bind(now)
        .bind(t.article_id)
        .bind(t.from_status.as_str())
        .bind(t.observed_reviewer)
        .execute(&mut *tx)
        .await
        .context("Failed to update article status")?;

    sqlx::query(INSERT_HISTORY)
        .bind(t.article_id)
        .bind(t.from_status.as_str())
        .bind(t.to_status.as_str())
        .bind(t.actor_id)
        .bind(&t.comment)
        .bind(now)
        .execute(&mut *tx)
        .await
        .context("Failed to record status change")?;

    let mut recorded = Vec::with_capacity(notifications.len());
    for n in notifications {
        let id = insert_notification_mysql(&mut *tx, n, now).await?;
        recorded.push(stored(id, n, now));
    }

    let row = sqlx::query(&format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"))
        .bind(t.article_id)
        .fetch_one(&mut *tx)
        .await
        .context("Article not found after transition")?;
    let article = row_to_article_mysql(&row)?;

    tx.commit().await?;
    Ok(Some(TransitionOutcome {
        article,
        notifications: recorded,
    }))
}
