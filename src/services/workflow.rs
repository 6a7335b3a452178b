//! Editorial workflow
//!
//! The only code that changes an article's status:
//!
//! ```text
//! Draft ──submit──▶ PendingReview ──approve──────────▶ Approved
//!                        ▲   │
//!              resubmit  │   └──request_changes──▶ ChangesRequested
//!                        └────────────────────────────────┘
//! ```
//!
//! Every operation checks caller input first, then the actor's permission,
//! then the article's state, then policy and qualification. The change is
//! written through the [`TransitionStore`] as a compare-and-set on the state
//! that was checked, so two racing transitions can never both succeed.

use crate::db::repositories::{ArticleRepository, Transition, TransitionStore};
use crate::models::{
    Article, ArticleRules, ArticleStatus, NewNotification, NotificationKind, StatusChange, User,
};
use crate::services::directory::Directory;
use crate::services::messages::{article_link, MessageContext};
use crate::services::notification::NotificationDispatcher;
use crate::services::policy::{self, Actor};
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

/// Longest accepted change request note, in characters
pub const MAX_NOTE_LENGTH: usize = 5000;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The actor may not perform this operation on this article
    #[error("Permission denied: {0}")]
    Permission(String),

    /// The article is not in a state that allows the operation
    #[error("Invalid state: {0}")]
    State(String),

    /// A publishing policy blocks the operation
    #[error("Policy violation: {0}")]
    Policy(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Article not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct WorkflowEngine {
    articles: Arc<dyn ArticleRepository>,
    store: Arc<dyn TransitionStore>,
    directory: Arc<Directory>,
    notifier: Arc<NotificationDispatcher>,
}

impl WorkflowEngine {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        store: Arc<dyn TransitionStore>,
        directory: Arc<Directory>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            articles,
            store,
            directory,
            notifier,
        }
    }

    /// Send a draft, or an article with requested changes, to review.
    ///
    /// `active_rules` is the currently active rules version, if any; the
    /// author must have accepted rules whenever a version is active.
    pub async fn submit(
        &self,
        article_id: i64,
        actor: &Actor,
        active_rules: Option<&ArticleRules>,
    ) -> Result<Article, WorkflowError> {
        let article = self.load(article_id).await?;

        if !policy::can_submit(actor, &article) {
            return Err(WorkflowError::Permission(
                "Only the author can submit this article".to_string(),
            ));
        }
        if !article.status.can_submit() {
            return Err(WorkflowError::State(format!(
                "Cannot submit an article that is {}",
                article.status
            )));
        }
        if !policy::satisfies_rules(actor, active_rules.is_some()) {
            return Err(WorkflowError::Policy(
                "Accept the article rules before submitting".to_string(),
            ));
        }

        // A previous reviewer stays only while qualified for the current category
        let reviewer = match article.reviewer_id {
            Some(reviewer_id) => self.directory.user(reviewer_id).await?,
            None => None,
        };
        let qualified = match &reviewer {
            Some(user) => self.directory.is_qualified(user, article.category_id).await?,
            None => false,
        };
        let reviewer = reviewer.filter(|_| qualified);
        let reviewer_id = reviewer.as_ref().map(|u| u.id);

        let resubmission = article.status == ArticleStatus::ChangesRequested;
        let mut recipients = self.directory.admins().await?;
        let kind = if resubmission {
            if let Some(reviewer) = reviewer {
                if !recipients.iter().any(|u| u.id == reviewer.id) {
                    recipients.push(reviewer);
                }
            }
            NotificationKind::ArticleResubmitted
        } else {
            NotificationKind::ArticleSubmitted
        };
        let notices = self.compose_for(&recipients, kind, &article, None);

        let transition = Transition {
            article_id: article.id,
            actor_id: actor.id,
            from_status: article.status,
            observed_reviewer: article.reviewer_id,
            to_status: ArticleStatus::PendingReview,
            reviewer_id,
            revision_note: None,
            submitted_at: Some(Utc::now()),
            published_at: article.published_at,
            comment: None,
        };

        self.commit(&transition, notices, recipients).await
    }

    /// Give a pending article to a reviewer, replacing any previous one.
    pub async fn assign_reviewer(
        &self,
        article_id: i64,
        reviewer_id: i64,
        actor: &Actor,
    ) -> Result<Article, WorkflowError> {
        let article = self.load(article_id).await?;

        if !policy::can_assign_reviewer(actor) {
            return Err(WorkflowError::Permission(
                "Only administrators can assign reviewers".to_string(),
            ));
        }
        if article.status != ArticleStatus::PendingReview {
            return Err(WorkflowError::State(format!(
                "Reviewers can only be assigned to pending articles, this one is {}",
                article.status
            )));
        }
        let reviewer = self
            .directory
            .user(reviewer_id)
            .await?
            .ok_or_else(|| WorkflowError::Validation("Reviewer not found".to_string()))?;
        if !self.directory.is_qualified(&reviewer, article.category_id).await? {
            return Err(WorkflowError::Validation(format!(
                "{} does not review this category",
                reviewer.username
            )));
        }

        let mut recipients = vec![reviewer.clone()];
        let mut notices = self.compose_for(
            &recipients,
            NotificationKind::ReviewerAssigned,
            &article,
            None,
        );
        if let Some(previous_id) = article.reviewer_id.filter(|id| *id != reviewer.id) {
            if let Some(previous) = self.directory.user(previous_id).await? {
                let displaced = std::slice::from_ref(&previous);
                notices.extend(self.compose_for(
                    displaced,
                    NotificationKind::ReviewerUnassigned,
                    &article,
                    None,
                ));
                recipients.push(previous);
            }
        }

        let transition = Transition {
            article_id: article.id,
            actor_id: actor.id,
            from_status: article.status,
            observed_reviewer: article.reviewer_id,
            to_status: ArticleStatus::PendingReview,
            reviewer_id: Some(reviewer.id),
            revision_note: article.revision_note.clone(),
            submitted_at: article.submitted_at,
            published_at: article.published_at,
            comment: None,
        };

        self.commit(&transition, notices, recipients).await
    }

    /// Publish a pending article. Only its assigned reviewer may do this.
    pub async fn approve(&self, article_id: i64, actor: &Actor) -> Result<Article, WorkflowError> {
        let article = self.load(article_id).await?;

        if !self.decides(actor, &article).await? {
            return Err(WorkflowError::Permission(
                "Only the assigned reviewer can approve this article".to_string(),
            ));
        }
        if article.status != ArticleStatus::PendingReview {
            return Err(WorkflowError::State(format!(
                "Cannot approve an article that is {}",
                article.status
            )));
        }

        let recipients = self.author_of(&article).await?;
        let notices = self.compose_for(
            &recipients,
            NotificationKind::ArticlePublished,
            &article,
            None,
        );

        let transition = Transition {
            article_id: article.id,
            actor_id: actor.id,
            from_status: article.status,
            observed_reviewer: article.reviewer_id,
            to_status: ArticleStatus::Approved,
            reviewer_id: article.reviewer_id,
            revision_note: None,
            submitted_at: article.submitted_at,
            published_at: Some(Utc::now()),
            comment: None,
        };

        self.commit(&transition, notices, recipients).await
    }

    /// Send a pending article back to its author with a note.
    pub async fn request_changes(
        &self,
        article_id: i64,
        actor: &Actor,
        note: &str,
    ) -> Result<Article, WorkflowError> {
        let note = note.trim();
        if note.is_empty() {
            return Err(WorkflowError::Validation(
                "A note explaining the requested changes is required".to_string(),
            ));
        }
        if note.chars().count() > MAX_NOTE_LENGTH {
            return Err(WorkflowError::Validation(format!(
                "Note must be at most {} characters",
                MAX_NOTE_LENGTH
            )));
        }

        let article = self.load(article_id).await?;

        if !self.decides(actor, &article).await? {
            return Err(WorkflowError::Permission(
                "Only the assigned reviewer can request changes".to_string(),
            ));
        }
        if article.status != ArticleStatus::PendingReview {
            return Err(WorkflowError::State(format!(
                "Cannot request changes on an article that is {}",
                article.status
            )));
        }

        let recipients = self.author_of(&article).await?;
        let notices = self.compose_for(
            &recipients,
            NotificationKind::ChangesRequested,
            &article,
            Some(note),
        );

        let transition = Transition {
            article_id: article.id,
            actor_id: actor.id,
            from_status: article.status,
            observed_reviewer: article.reviewer_id,
            to_status: ArticleStatus::ChangesRequested,
            reviewer_id: article.reviewer_id,
            revision_note: Some(note.to_string()),
            submitted_at: article.submitted_at,
            published_at: article.published_at,
            comment: Some(note.to_string()),
        };

        self.commit(&transition, notices, recipients).await
    }

    /// Resubmission is submission from `ChangesRequested`
    pub async fn resubmit(
        &self,
        article_id: i64,
        actor: &Actor,
        active_rules: Option<&ArticleRules>,
    ) -> Result<Article, WorkflowError> {
        self.submit(article_id, actor, active_rules).await
    }

    /// Status history, oldest first
    pub async fn history(
        &self,
        article_id: i64,
        actor: &Actor,
    ) -> Result<Vec<StatusChange>, WorkflowError> {
        let article = self.load(article_id).await?;
        let covers = actor.is_reviewer()
            && self
                .directory
                .covers_category(actor.id, article.category_id)
                .await?;
        if !policy::can_view_history(actor, &article, covers) {
            return Err(WorkflowError::Permission(
                "You cannot view this article's history".to_string(),
            ));
        }

        Ok(self
            .articles
            .history(article.id)
            .await
            .context("Failed to load status history")?)
    }

    async fn load(&self, article_id: i64) -> Result<Article, WorkflowError> {
        self.articles
            .get_by_id(article_id)
            .await
            .context("Failed to load article")?
            .ok_or(WorkflowError::NotFound)
    }

    /// The actor is the assigned reviewer and still reviews the category
    async fn decides(&self, actor: &Actor, article: &Article) -> Result<bool, WorkflowError> {
        if !policy::is_assigned_reviewer(actor, article) {
            return Ok(false);
        }
        Ok(self
            .directory
            .covers_category(actor.id, article.category_id)
            .await?)
    }

    async fn author_of(&self, article: &Article) -> Result<Vec<User>, WorkflowError> {
        Ok(self.directory.user(article.author_id).await?.into_iter().collect())
    }

    fn compose_for(
        &self,
        recipients: &[User],
        kind: NotificationKind,
        article: &Article,
        note: Option<&str>,
    ) -> Vec<NewNotification> {
        let link = article_link(kind, article.id, &article.slug);
        recipients
            .iter()
            .map(|recipient| {
                let ctx = MessageContext {
                    article_title: article.title_in(recipient.preferred_locale),
                    note,
                    ..Default::default()
                };
                self.notifier
                    .compose(recipient, kind, &ctx, Some(article.id), Some(link.clone()))
            })
            .collect()
    }

    /// Apply the transition, then hand its notifications to background
    /// email delivery. `recipients` and `notices` are paired by position.
    async fn commit(
        &self,
        transition: &Transition,
        notices: Vec<NewNotification>,
        recipients: Vec<User>,
    ) -> Result<Article, WorkflowError> {
        let outcome = self
            .store
            .apply(transition, &notices)
            .await?
            .ok_or_else(|| WorkflowError::State("Article changed concurrently".to_string()))?;

        tracing::info!(
            article_id = transition.article_id,
            actor_id = transition.actor_id,
            from = %transition.from_status,
            to = %transition.to_status,
            reviewer_id = ?transition.reviewer_id,
            "Article transition"
        );

        self.notifier.spawn_delivery(recipients, outcome.notifications);

        Ok(outcome.article)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{
        force_status, seed_article, seed_category, seed_user, setup_pool,
    };
    use crate::db::repositories::{
        CategoryRepository, NotificationRepository, RulesRepository, SqlxArticleRepository,
        SqlxCategoryRepository, SqlxNotificationRepository, SqlxRulesRepository,
        SqlxTransitionStore, SqlxUserRepository, UserRepository,
    };
    use crate::db::DynDatabasePool;
    use crate::models::{ArticleQuery, ListParams, LocalizedText, Notification, UserRole};
    use crate::services::email::{EmailTemplates, Mailer, SiteInfo};
    use crate::services::notification::testing::{FailingMailer, RecordingMailer, StalledMailer};
    use std::time::{Duration, Instant};

    struct Fixture {
        pool: DynDatabasePool,
        engine: WorkflowEngine,
        author: User,
        admin: User,
        reviewer: User,
        category_id: i64,
    }

    async fn fixture_with(mailer: Arc<dyn Mailer>) -> Fixture {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let admin = seed_user(&pool, "admin", UserRole::Admin).await;
        let reviewer = seed_user(&pool, "rustam", UserRole::Reviewer).await;
        let tech = seed_category(&pool, "tech").await;

        let categories = SqlxCategoryRepository::boxed(pool.clone());
        categories.add_reviewer(tech.id, reviewer.id).await.unwrap();

        let directory = Arc::new(Directory::new(
            SqlxUserRepository::boxed(pool.clone()),
            categories,
        ));
        let templates = EmailTemplates::new(SiteInfo {
            name: "Nashr".to_string(),
            url: "http://localhost".to_string(),
        })
        .unwrap();
        let notifier = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            mailer,
            Arc::new(templates),
        ));
        let engine = WorkflowEngine::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxTransitionStore::boxed(pool.clone()),
            directory,
            notifier,
        );

        Fixture {
            pool,
            engine,
            author,
            admin,
            reviewer,
            category_id: tech.id,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(Arc::new(RecordingMailer::default())).await
    }

    async fn notifications_of(pool: &DynDatabasePool, user_id: i64) -> Vec<Notification> {
        SqlxNotificationRepository::new(pool.clone())
            .list_for_user(user_id, false, &ListParams::new(1, 100))
            .await
            .unwrap()
            .0
    }

    async fn accept_rules(pool: &DynDatabasePool, user: &User) -> User {
        let mut user = user.clone();
        user.has_accepted_rules = true;
        SqlxUserRepository::new(pool.clone()).update(&user).await.unwrap()
    }

    async fn pending_article(f: &Fixture) -> Article {
        let article = seed_article(&f.pool, f.author.id, f.category_id, "maqola").await;
        f.engine
            .submit(article.id, &Actor::from(&f.author), None)
            .await
            .unwrap()
    }

    async fn assigned_article(f: &Fixture) -> Article {
        let article = pending_article(f).await;
        f.engine
            .assign_reviewer(article.id, f.reviewer.id, &Actor::from(&f.admin))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_editorial_scenario() {
        let f = fixture().await;
        let rules = SqlxRulesRepository::new(f.pool.clone())
            .create(&LocalizedText::new("Qoidalar"), &LocalizedText::new("Matn"), true)
            .await
            .unwrap();
        let draft = seed_article(&f.pool, f.author.id, f.category_id, "rust-haqida").await;

        // Rules are active and not yet accepted
        let err = f
            .engine
            .submit(draft.id, &Actor::from(&f.author), Some(&rules))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Policy(_)));

        let author = accept_rules(&f.pool, &f.author).await;
        let author_actor = Actor::from(&author);
        let pending = f
            .engine
            .submit(draft.id, &author_actor, Some(&rules))
            .await
            .unwrap();
        assert_eq!(pending.status, ArticleStatus::PendingReview);
        assert!(pending.submitted_at.is_some());
        let admin_inbox = notifications_of(&f.pool, f.admin.id).await;
        assert_eq!(admin_inbox.len(), 1);
        assert_eq!(admin_inbox[0].kind, NotificationKind::ArticleSubmitted);

        let assigned = f
            .engine
            .assign_reviewer(draft.id, f.reviewer.id, &Actor::from(&f.admin))
            .await
            .unwrap();
        assert_eq!(assigned.reviewer_id, Some(f.reviewer.id));
        let reviewer_inbox = notifications_of(&f.pool, f.reviewer.id).await;
        assert_eq!(reviewer_inbox[0].kind, NotificationKind::ReviewerAssigned);

        let reviewer_actor = Actor::from(&f.reviewer);
        let returned = f
            .engine
            .request_changes(draft.id, &reviewer_actor, "  add citations ")
            .await
            .unwrap();
        assert_eq!(returned.status, ArticleStatus::ChangesRequested);
        assert_eq!(returned.revision_note.as_deref(), Some("add citations"));
        let author_inbox = notifications_of(&f.pool, author.id).await;
        assert_eq!(author_inbox[0].kind, NotificationKind::ChangesRequested);
        assert!(author_inbox[0].message.contains("add citations"));

        let resubmitted = f
            .engine
            .resubmit(draft.id, &author_actor, Some(&rules))
            .await
            .unwrap();
        assert_eq!(resubmitted.status, ArticleStatus::PendingReview);
        assert!(resubmitted.revision_note.is_none());
        assert_eq!(resubmitted.reviewer_id, Some(f.reviewer.id));
        let reviewer_inbox = notifications_of(&f.pool, f.reviewer.id).await;
        assert_eq!(reviewer_inbox[0].kind, NotificationKind::ArticleResubmitted);

        let published = f.engine.approve(draft.id, &reviewer_actor).await.unwrap();
        assert_eq!(published.status, ArticleStatus::Approved);
        assert!(published.published_at.is_some());
        let author_inbox = notifications_of(&f.pool, author.id).await;
        assert_eq!(author_inbox[0].kind, NotificationKind::ArticlePublished);

        let (listed, _) = SqlxArticleRepository::new(f.pool.clone())
            .list_published(&ListParams::default(), &ArticleQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, draft.id);

        let history = f.engine.history(draft.id, &author_actor).await.unwrap();
        let path: Vec<_> = history.iter().map(|h| (h.from_status, h.to_status)).collect();
        assert_eq!(
            path,
            vec![
                (ArticleStatus::Draft, ArticleStatus::PendingReview),
                (ArticleStatus::PendingReview, ArticleStatus::PendingReview),
                (ArticleStatus::PendingReview, ArticleStatus::ChangesRequested),
                (ArticleStatus::ChangesRequested, ArticleStatus::PendingReview),
                (ArticleStatus::PendingReview, ArticleStatus::Approved),
            ]
        );
        assert_eq!(history[2].comment.as_deref(), Some("add citations"));
    }

    #[tokio::test]
    async fn test_submit_by_non_owner_is_denied() {
        let f = fixture().await;
        let other = seed_user(&f.pool, "bekzod", UserRole::Author).await;
        let draft = seed_article(&f.pool, f.author.id, f.category_id, "maqola").await;

        let err = f
            .engine
            .submit(draft.id, &Actor::from(&other), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));

        let current = SqlxArticleRepository::new(f.pool.clone())
            .get_by_id(draft.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, ArticleStatus::Draft);
    }

    #[tokio::test]
    async fn test_non_owner_sees_permission_before_state() {
        let f = fixture().await;
        let other = seed_user(&f.pool, "bekzod", UserRole::Author).await;
        let article = pending_article(&f).await;

        let err = f
            .engine
            .submit(article.id, &Actor::from(&other), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));

        let err = f
            .engine
            .submit(article.id, &Actor::from(&f.author), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));
    }

    #[tokio::test]
    async fn test_missing_article() {
        let f = fixture().await;
        let err = f
            .engine
            .submit(9999, &Actor::from(&f.author), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_note_is_rejected() {
        let f = fixture().await;
        let article = assigned_article(&f).await;

        let err = f
            .engine
            .request_changes(article.id, &Actor::from(&f.reviewer), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let current = SqlxArticleRepository::new(f.pool.clone())
            .get_by_id(article.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, ArticleStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_approve_twice() {
        let f = fixture().await;
        let article = assigned_article(&f).await;
        let reviewer = Actor::from(&f.reviewer);

        let first = f.engine.approve(article.id, &reviewer).await.unwrap();
        let err = f.engine.approve(article.id, &reviewer).await.unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));

        let current = SqlxArticleRepository::new(f.pool.clone())
            .get_by_id(article.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.published_at, first.published_at);
    }

    #[tokio::test]
    async fn test_only_assigned_reviewer_decides() {
        let f = fixture().await;
        let article = assigned_article(&f).await;
        let outsider = seed_user(&f.pool, "sardor", UserRole::Reviewer).await;

        for actor in [Actor::from(&outsider), Actor::from(&f.admin), Actor::from(&f.author)] {
            let err = f.engine.approve(article.id, &actor).await.unwrap_err();
            assert!(matches!(err, WorkflowError::Permission(_)));
            let err = f
                .engine
                .request_changes(article.id, &actor, "note")
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Permission(_)));
        }
    }

    #[tokio::test]
    async fn test_approve_unassigned_pending_article_is_denied() {
        let f = fixture().await;
        let article = pending_article(&f).await;
        let err = f
            .engine
            .approve(article.id, &Actor::from(&f.reviewer))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
    }

    #[tokio::test]
    async fn test_assign_checks() {
        let f = fixture().await;
        let draft = seed_article(&f.pool, f.author.id, f.category_id, "qoralama").await;
        let admin = Actor::from(&f.admin);

        let err = f
            .engine
            .assign_reviewer(draft.id, f.reviewer.id, &Actor::from(&f.reviewer))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));

        let err = f
            .engine
            .assign_reviewer(draft.id, f.reviewer.id, &admin)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));

        let pending = pending_article(&f).await;
        let unqualified = seed_user(&f.pool, "sardor", UserRole::Reviewer).await;
        for candidate in [unqualified.id, f.author.id, 9999] {
            let err = f
                .engine
                .assign_reviewer(pending.id, candidate, &admin)
                .await
                .unwrap_err();
            assert!(matches!(err, WorkflowError::Validation(_)));
        }
    }

    #[tokio::test]
    async fn test_reassignment_notifies_displaced_reviewer() {
        let f = fixture().await;
        let article = assigned_article(&f).await;
        let second = seed_user(&f.pool, "sardor", UserRole::Reviewer).await;
        SqlxCategoryRepository::new(f.pool.clone())
            .add_reviewer(f.category_id, second.id)
            .await
            .unwrap();

        let reassigned = f
            .engine
            .assign_reviewer(article.id, second.id, &Actor::from(&f.admin))
            .await
            .unwrap();
        assert_eq!(reassigned.reviewer_id, Some(second.id));

        let displaced = notifications_of(&f.pool, f.reviewer.id).await;
        assert_eq!(displaced[0].kind, NotificationKind::ReviewerUnassigned);
        let assigned = notifications_of(&f.pool, second.id).await;
        assert_eq!(assigned[0].kind, NotificationKind::ReviewerAssigned);

        // The previous reviewer lost the right to decide
        let err = f
            .engine
            .approve(article.id, &Actor::from(&f.reviewer))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
    }

    #[tokio::test]
    async fn test_concurrent_assignments_leave_one_reviewer() {
        let f = fixture().await;
        let article = pending_article(&f).await;
        let second = seed_user(&f.pool, "sardor", UserRole::Reviewer).await;
        SqlxCategoryRepository::new(f.pool.clone())
            .add_reviewer(f.category_id, second.id)
            .await
            .unwrap();
        let admin = Actor::from(&f.admin);

        let (a, b) = tokio::join!(
            f.engine.assign_reviewer(article.id, f.reviewer.id, &admin),
            f.engine.assign_reviewer(article.id, second.id, &admin),
        );
        for result in [&a, &b] {
            if let Err(e) = result {
                assert!(matches!(e, WorkflowError::State(_)), "unexpected error: {e}");
            }
        }
        assert!(a.is_ok() || b.is_ok());

        let current = SqlxArticleRepository::new(f.pool.clone())
            .get_by_id(article.id)
            .await
            .unwrap()
            .unwrap();
        let winner = current.reviewer_id.unwrap();
        assert!(winner == f.reviewer.id || winner == second.id);
        let last_success = [a, b].into_iter().filter_map(Result::ok).last().unwrap();
        assert!(last_success.reviewer_id.is_some());
    }

    #[tokio::test]
    async fn test_email_failure_does_not_fail_transition() {
        let f = fixture_with(Arc::new(FailingMailer)).await;
        let draft = seed_article(&f.pool, f.author.id, f.category_id, "maqola").await;

        let pending = f
            .engine
            .submit(draft.id, &Actor::from(&f.author), None)
            .await
            .unwrap();
        assert_eq!(pending.status, ArticleStatus::PendingReview);
        assert_eq!(notifications_of(&f.pool, f.admin.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_emails_follow_notifications() {
        let mailer = Arc::new(RecordingMailer::default());
        let f = fixture_with(mailer.clone()).await;
        let article = assigned_article(&f).await;

        f.engine
            .approve(article.id, &Actor::from(&f.reviewer))
            .await
            .unwrap();

        let sent = mailer.wait_for(3).await;
        let mut recipients: Vec<_> = sent.iter().map(|e| e.to.as_str()).collect();
        recipients.sort_unstable();
        assert_eq!(
            recipients,
            vec!["admin@example.com", "aziz@example.com", "rustam@example.com"]
        );
        let to_author = sent.iter().find(|e| e.to == "aziz@example.com").unwrap();
        assert!(to_author.body.contains("/articles/maqola"));
    }

    #[tokio::test]
    async fn test_stalled_mail_relay_does_not_delay_transition() {
        let f = fixture_with(Arc::new(StalledMailer {
            delay: Duration::from_secs(5),
        }))
        .await;
        let draft = seed_article(&f.pool, f.author.id, f.category_id, "maqola").await;

        let started = Instant::now();
        let pending = f
            .engine
            .submit(draft.id, &Actor::from(&f.author), None)
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(pending.status, ArticleStatus::PendingReview);
        assert_eq!(notifications_of(&f.pool, f.admin.id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_moving_category_drops_unqualified_reviewer() {
        let f = fixture().await;
        let article = assigned_article(&f).await;
        let reviewer = Actor::from(&f.reviewer);
        f.engine
            .request_changes(article.id, &reviewer, "boshqa bo'limga mos")
            .await
            .unwrap();

        let sport = seed_category(&f.pool, "sport").await;
        sqlx::query("UPDATE articles SET category_id = ? WHERE id = ?")
            .bind(sport.id)
            .bind(article.id)
            .execute(f.pool.as_sqlite().unwrap())
            .await
            .unwrap();

        let resubmitted = f
            .engine
            .resubmit(article.id, &Actor::from(&f.author), None)
            .await
            .unwrap();
        assert_eq!(resubmitted.status, ArticleStatus::PendingReview);
        assert_eq!(resubmitted.reviewer_id, None);
        let inbox = notifications_of(&f.pool, f.reviewer.id).await;
        assert!(inbox
            .iter()
            .all(|n| n.kind != NotificationKind::ArticleResubmitted));

        let err = f.engine.approve(article.id, &reviewer).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
        let err = f
            .engine
            .assign_reviewer(article.id, f.reviewer.id, &Actor::from(&f.admin))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));
    }

    #[tokio::test]
    async fn test_reviewer_removed_from_category_cannot_decide() {
        let f = fixture().await;
        let article = assigned_article(&f).await;
        SqlxCategoryRepository::new(f.pool.clone())
            .remove_reviewer(f.category_id, f.reviewer.id)
            .await
            .unwrap();

        let reviewer = Actor::from(&f.reviewer);
        let err = f.engine.approve(article.id, &reviewer).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
        let err = f
            .engine
            .request_changes(article.id, &reviewer, "note")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));

        let current = SqlxArticleRepository::new(f.pool.clone())
            .get_by_id(article.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.status, ArticleStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_submit_without_admins() {
        let pool = setup_pool().await;
        let author = seed_user(&pool, "aziz", UserRole::Author).await;
        let tech = seed_category(&pool, "tech").await;
        let directory = Arc::new(Directory::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxCategoryRepository::boxed(pool.clone()),
        ));
        let notifier = Arc::new(NotificationDispatcher::new(
            SqlxNotificationRepository::boxed(pool.clone()),
            Arc::new(RecordingMailer::default()),
            Arc::new(
                EmailTemplates::new(SiteInfo {
                    name: "Nashr".to_string(),
                    url: String::new(),
                })
                .unwrap(),
            ),
        ));
        let engine = WorkflowEngine::new(
            SqlxArticleRepository::boxed(pool.clone()),
            SqlxTransitionStore::boxed(pool.clone()),
            directory,
            notifier,
        );
        let draft = seed_article(&pool, author.id, tech.id, "maqola").await;

        let pending = engine.submit(draft.id, &Actor::from(&author), None).await.unwrap();
        assert_eq!(pending.status, ArticleStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_published_article_is_terminal() {
        let f = fixture().await;
        let article = seed_article(&f.pool, f.author.id, f.category_id, "maqola").await;
        force_status(&f.pool, article.id, ArticleStatus::Approved).await;

        let err = f
            .engine
            .submit(article.id, &Actor::from(&f.author), None)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));
        let err = f
            .engine
            .assign_reviewer(article.id, f.reviewer.id, &Actor::from(&f.admin))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::State(_)));
    }

    #[tokio::test]
    async fn test_history_visibility() {
        let f = fixture().await;
        let article = pending_article(&f).await;
        let stranger = seed_user(&f.pool, "bekzod", UserRole::Author).await;

        assert_eq!(
            f.engine
                .history(article.id, &Actor::from(&f.reviewer))
                .await
                .unwrap()
                .len(),
            1
        );
        let err = f
            .engine
            .history(article.id, &Actor::from(&stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
    }

    #[tokio::test]
    async fn test_category_reviewer_loses_history_once_decided() {
        let f = fixture().await;
        let colleague = seed_user(&f.pool, "dilshod", UserRole::Reviewer).await;
        SqlxCategoryRepository::new(f.pool.clone())
            .add_reviewer(f.category_id, colleague.id)
            .await
            .unwrap();
        let article = assigned_article(&f).await;

        assert!(f
            .engine
            .history(article.id, &Actor::from(&colleague))
            .await
            .is_ok());

        f.engine
            .approve(article.id, &Actor::from(&f.reviewer))
            .await
            .unwrap();

        let err = f
            .engine
            .history(article.id, &Actor::from(&colleague))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Permission(_)));
        assert_eq!(
            f.engine
                .history(article.id, &Actor::from(&f.reviewer))
                .await
                .unwrap()
                .len(),
            3
        );
    }
}
