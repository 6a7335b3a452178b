//! Notification dispatcher
//!
//! Composes notifications in the recipient's language, records standalone
//! notifications, and delivers email copies once records are committed.
//! Email is best effort: failures are logged and never reach the caller.

use crate::db::repositories::NotificationRepository;
use crate::models::{
    ListParams, NewNotification, Notification, NotificationKind, PagedResult, User,
};
use crate::services::email::{EmailContent, EmailTemplates, Mailer};
use crate::services::messages::{compose, MessageContext};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct NotificationDispatcher {
    repo: Arc<dyn NotificationRepository>,
    mailer: Arc<dyn Mailer>,
    templates: Arc<EmailTemplates>,
}

impl NotificationDispatcher {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        mailer: Arc<dyn Mailer>,
        templates: Arc<EmailTemplates>,
    ) -> Self {
        Self {
            repo,
            mailer,
            templates,
        }
    }

    /// Build a notification for `recipient` in their preferred locale
    pub fn compose(
        &self,
        recipient: &User,
        kind: NotificationKind,
        ctx: &MessageContext<'_>,
        article_id: Option<i64>,
        link: Option<String>,
    ) -> NewNotification {
        let (title, message) = compose(kind, recipient.preferred_locale, ctx);
        NewNotification {
            user_id: recipient.id,
            kind,
            title,
            message,
            link,
            article_id,
        }
    }

    /// Record a notification outside any workflow transition, then email it
    /// in the background
    pub async fn notify(
        self: &Arc<Self>,
        recipient: &User,
        notification: NewNotification,
    ) -> Result<Notification, NotificationError> {
        let stored = self
            .repo
            .create(&notification)
            .await
            .context("Failed to record notification")?;
        self.spawn_delivery(vec![recipient.clone()], vec![stored.clone()]);
        Ok(stored)
    }

    /// Email committed notifications on a separate task. Returns at once.
    pub fn spawn_delivery(
        self: &Arc<Self>,
        recipients: Vec<User>,
        notifications: Vec<Notification>,
    ) {
        if recipients.is_empty() {
            return;
        }
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.deliver_all(&recipients, &notifications).await;
        });
    }

    /// Email a committed notification. Never fails.
    pub async fn deliver(&self, recipient: &User, notification: &Notification) {
        if !recipient.is_active || recipient.email.trim().is_empty() {
            tracing::debug!(user_id = recipient.id, "Skipping email for unreachable recipient");
            return;
        }

        let rendered = match self.templates.render(&EmailContent {
            username: &recipient.username,
            locale: recipient.preferred_locale,
            title: &notification.title,
            message: &notification.message,
            link: notification.link.as_deref(),
        }) {
            Ok(rendered) => rendered,
            Err(e) => {
                tracing::warn!(
                    notification_id = notification.id,
                    "Failed to render notification email: {:#}",
                    e
                );
                return;
            }
        };

        if let Err(e) = self
            .mailer
            .send(&recipient.email, &rendered.subject, &rendered.body)
            .await
        {
            tracing::warn!(
                notification_id = notification.id,
                user_id = recipient.id,
                "Failed to send notification email: {:#}",
                e
            );
        }
    }

    /// Email every committed notification to its recipient.
    /// `recipients` and `notifications` are paired by position.
    pub async fn deliver_all(&self, recipients: &[User], notifications: &[Notification]) {
        for (recipient, notification) in recipients.iter().zip(notifications) {
            self.deliver(recipient, notification).await;
        }
    }

    pub async fn list(
        &self,
        user_id: i64,
        unread_only: bool,
        params: &ListParams,
    ) -> Result<PagedResult<Notification>, NotificationError> {
        let (items, total) = self
            .repo
            .list_for_user(user_id, unread_only, params)
            .await
            .context("Failed to list notifications")?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotificationError> {
        Ok(self
            .repo
            .unread_count(user_id)
            .await
            .context("Failed to count notifications")?)
    }

    /// Mark one of the user's notifications read. Someone else's
    /// notification is reported as not found.
    pub async fn mark_read(&self, id: i64, user_id: i64) -> Result<(), NotificationError> {
        let found = self
            .repo
            .mark_read(id, user_id)
            .await
            .context("Failed to mark notification read")?;
        if !found {
            return Err(NotificationError::NotFound);
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, user_id: i64) -> Result<u64, NotificationError> {
        Ok(self
            .repo
            .mark_all_read(user_id)
            .await
            .context("Failed to mark notifications read")?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Mailers for tests

    use crate::services::email::Mailer;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentEmail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    /// Keeps every email it is asked to send
    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentEmail>>,
    }

    impl RecordingMailer {
        pub fn sent(&self) -> Vec<SentEmail> {
            self.sent.lock().unwrap().clone()
        }

        /// Wait for background deliveries until `count` emails arrived
        pub async fn wait_for(&self, count: usize) -> Vec<SentEmail> {
            for _ in 0..200 {
                let sent = self.sent();
                if sent.len() >= count {
                    return sent;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            self.sent()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
            self.sent.lock().unwrap().push(SentEmail {
                to: to.to_string(),
                subject: subject.to_string(),
                body: body.to_string(),
            });
            Ok(())
        }
    }

    /// Fails every send, like an unreachable SMTP server
    pub struct FailingMailer;

    /// Hangs for `delay` before failing, like a relay that times out
    pub struct StalledMailer {
        pub delay: Duration,
    }

    #[async_trait]
    impl Mailer for StalledMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
            tokio::time::sleep(self.delay).await;
            Err(anyhow!("connection timed out"))
        }
    }

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<()> {
            Err(anyhow!("connection refused"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingMailer, RecordingMailer, StalledMailer};
    use super::*;
    use std::time::{Duration, Instant};
    use crate::db::repositories::test_support::{seed_user, setup_pool};
    use crate::db::repositories::SqlxNotificationRepository;
    use crate::models::{Locale, UserRole};
    use crate::services::email::SiteInfo;

    fn templates() -> Arc<EmailTemplates> {
        Arc::new(
            EmailTemplates::new(SiteInfo {
                name: "Nashr".to_string(),
                url: "http://localhost:8080".to_string(),
            })
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_compose_uses_recipient_locale() {
        let pool = setup_pool().await;
        let mut user = seed_user(&pool, "ivan", UserRole::Reviewer).await;
        user.preferred_locale = Locale::Ru;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            Arc::new(RecordingMailer::default()),
            templates(),
        ));

        let ctx = MessageContext {
            article_title: "Rust",
            ..Default::default()
        };
        let n = dispatcher.compose(&user, NotificationKind::ReviewerAssigned, &ctx, Some(1), None);
        assert_eq!(n.user_id, user.id);
        assert_eq!(n.title, "Вам назначена статья");
    }

    #[tokio::test]
    async fn test_notify_records_and_emails() {
        let pool = setup_pool().await;
        let user = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            mailer.clone(),
            templates(),
        ));

        let ctx = MessageContext {
            category_name: "Texnologiya",
            ..Default::default()
        };
        let n = dispatcher.compose(&user, NotificationKind::CategoryAssigned, &ctx, None, None);
        let stored = dispatcher.notify(&user, n).await.unwrap();

        assert_eq!(dispatcher.unread_count(user.id).await.unwrap(), 1);
        let sent = mailer.wait_for(1).await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "rustam@example.com");
        assert!(sent[0].subject.contains(&stored.title));
    }

    #[tokio::test]
    async fn test_email_failure_keeps_record() {
        let pool = setup_pool().await;
        let user = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            Arc::new(FailingMailer),
            templates(),
        ));

        let n = dispatcher.compose(
            &user,
            NotificationKind::CategoryAssigned,
            &MessageContext::default(),
            None,
            None,
        );
        assert!(dispatcher.notify(&user, n).await.is_ok());
        assert_eq!(dispatcher.unread_count(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stalled_relay_does_not_delay_notify() {
        let pool = setup_pool().await;
        let user = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            Arc::new(StalledMailer {
                delay: Duration::from_secs(5),
            }),
            templates(),
        ));

        let n = dispatcher.compose(
            &user,
            NotificationKind::CategoryAssigned,
            &MessageContext::default(),
            None,
            None,
        );
        let started = Instant::now();
        dispatcher.notify(&user, n).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(dispatcher.unread_count(user.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_inactive_recipient_gets_no_email() {
        let pool = setup_pool().await;
        let mut user = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        user.is_active = false;
        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            mailer.clone(),
            templates(),
        ));

        let n = dispatcher.compose(
            &user,
            NotificationKind::CategoryAssigned,
            &MessageContext::default(),
            None,
            None,
        );
        dispatcher.notify(&user, n).await.unwrap();
        assert!(mailer.wait_for(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_mark_read_of_foreign_notification_is_not_found() {
        let pool = setup_pool().await;
        let owner = seed_user(&pool, "aziz", UserRole::Author).await;
        let other = seed_user(&pool, "bekzod", UserRole::Author).await;
        let dispatcher = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool),
            Arc::new(RecordingMailer::default()),
            templates(),
        ));

        let n = dispatcher.compose(
            &owner,
            NotificationKind::ArticlePublished,
            &MessageContext::default(),
            None,
            None,
        );
        let stored = dispatcher.notify(&owner, n).await.unwrap();

        assert!(matches!(
            dispatcher.mark_read(stored.id, other.id).await,
            Err(NotificationError::NotFound)
        ));
        dispatcher.mark_read(stored.id, owner.id).await.unwrap();
        let page = dispatcher.list(owner.id, true, &ListParams::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }
}
