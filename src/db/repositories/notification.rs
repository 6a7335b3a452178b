//! Notification repository
//!
//! Durable in-app notifications. The insert helpers take a bare connection
//! so workflow transitions can record notifications in their transaction.

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ListParams, NewNotification, Notification, NotificationKind};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlConnection, Row, SqliteConnection};
use std::sync::Arc;

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, link, article_id, is_read, created_at";

const INSERT_NOTIFICATION: &str = r#"
    INSERT INTO notifications (user_id, kind, title, message, link, article_id, is_read, created_at)
    VALUES (?, ?, ?, ?, ?, ?, FALSE, ?)
"#;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;

    /// Notifications of a user, newest first
    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    /// Mark one notification read. Only the owner can do this; returns
    /// whether the notification exists and belongs to `user_id`.
    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool>;

    /// Mark every notification of the user read, returning how many changed
    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;
}

pub struct SqlxNotificationRepository {
    pool: DynDatabasePool,
}

impl SqlxNotificationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn NotificationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl NotificationRepository for SqlxNotificationRepository {
    async fn create(&self, notification: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut conn = pool.acquire().await?;
                let id = insert_notification_sqlite(&mut *conn, notification, now).await?;
                Ok(stored(id, notification, now))
            }
            Backend::Mysql(pool) => {
                let mut conn = pool.acquire().await?;
                let id = insert_notification_mysql(&mut *conn, notification, now).await?;
                Ok(stored(id, notification, now))
            }
        }
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<(Vec<Notification>, i64)> {
        let filter = "user_id = ? AND (? = FALSE OR is_read = FALSE)";
        let list_sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE {filter} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let count_sql = format!("SELECT COUNT(*) AS count FROM notifications WHERE {filter}");

        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(user_id)
                    .bind(unread_only)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(user_id)
                    .bind(unread_only)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count notifications")?
                    .get("count");
                let items = rows
                    .iter()
                    .map(row_to_notification_sqlite)
                    .collect::<Result<_>>()?;
                Ok((items, total))
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&list_sql)
                    .bind(user_id)
                    .bind(unread_only)
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list notifications")?;
                let total: i64 = sqlx::query(&count_sql)
                    .bind(user_id)
                    .bind(unread_only)
                    .fetch_one(pool)
                    .await
                    .context("Failed to count notifications")?
                    .get("count");
                let items = rows
                    .iter()
                    .map(row_to_notification_mysql)
                    .collect::<Result<_>>()?;
                Ok((items, total))
            }
        }
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        let sql = "SELECT COUNT(*) AS count FROM notifications WHERE user_id = ? AND is_read = FALSE";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .map(|r| r.get("count")),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .fetch_one(pool)
                .await
                .map(|r| r.get("count")),
        }
        .context("Failed to count unread notifications")?;

        Ok(count)
    }

    async fn mark_read(&self, id: i64, user_id: i64) -> Result<bool> {
        // Existence is checked separately: re-marking a read row changes nothing
        let update = "UPDATE notifications SET is_read = TRUE WHERE id = ? AND user_id = ?";
        let check = "SELECT id FROM notifications WHERE id = ? AND user_id = ?";
        let found = match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(update).bind(id).bind(user_id).execute(pool).await?;
                sqlx::query(check)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .map(|r| r.is_some())
            }
            Backend::Mysql(pool) => {
                sqlx::query(update).bind(id).bind(user_id).execute(pool).await?;
                sqlx::query(check)
                    .bind(id)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .map(|r| r.is_some())
            }
        }
        .context("Failed to mark notification read")?;

        Ok(found)
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        let sql = "UPDATE notifications SET is_read = TRUE WHERE user_id = ? AND is_read = FALSE";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(user_id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .context("Failed to mark notifications read")?;

        Ok(affected)
    }
}

/// The stored form of a freshly inserted notification
pub(crate) fn stored(id: i64, n: &NewNotification, created_at: DateTime<Utc>) -> Notification {
    Notification {
        id,
        user_id: n.user_id,
        kind: n.kind,
        title: n.title.clone(),
        message: n.message.clone(),
        link: n.link.clone(),
        article_id: n.article_id,
        is_read: false,
        created_at,
    }
}

pub(crate) async fn insert_notification_sqlite(
    conn: &mut SqliteConnection,
    n: &NewNotification,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(INSERT_NOTIFICATION)
        .bind(n.user_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.link)
        .bind(n.article_id)
        .bind(now)
        .execute(conn)
        .await
        .context("Failed to create notification")?
        .last_insert_rowid();
    Ok(id)
}

pub(crate) async fn insert_notification_mysql(
    conn: &mut MySqlConnection,
    n: &NewNotification,
    now: DateTime<Utc>,
) -> Result<i64> {
    let id = sqlx::query(INSERT_NOTIFICATION)
        .bind(n.user_id)
        .bind(n.kind.as_str())
        .bind(&n.title)
        .bind(&n.message)
        .bind(&n.link)
        .bind(n.article_id)
        .bind(now)
        .execute(conn)
        .await
        .context("Failed to create notification")?
        .last_insert_id() as i64;
    Ok(id)
}

fn parse_kind(raw: &str) -> Result<NotificationKind> {
    NotificationKind::from_str(raw).with_context(|| format!("Unknown notification kind: {}", raw))
}

fn row_to_notification_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: parse_kind(&kind)?,
        title: row.get("title"),
        message: row.get("message"),
        link: row.get("link"),
        article_id: row.get("article_id"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}

fn row_to_notification_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Notification> {
    let kind: String = row.get("kind");
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        kind: parse_kind(&kind)?,
        title: row.get("title"),
        message: row.get("message"),
        link: row.get("link"),
        article_id: row.get("article_id"),
        is_read: row.get("is_read"),
        created_at: row.get("created_at"),
    })
}
