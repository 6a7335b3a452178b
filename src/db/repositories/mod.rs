//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles persistence for one entity; article status
//! changes go through the transition store in [`workflow`].

pub mod article;
pub mod category;
pub mod notification;
pub mod rules;
pub mod session;
pub mod user;
pub mod workflow;

pub use article::{ArticleContent, ArticleRepository, NewArticle, SqlxArticleRepository};
pub use category::{CategoryRepository, SqlxCategoryRepository};
pub use notification::{NotificationRepository, SqlxNotificationRepository};
pub use rules::{RulesRepository, SqlxRulesRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
pub use workflow::{SqlxTransitionStore, Transition, TransitionOutcome, TransitionStore};

/// Whether a repository error was caused by a UNIQUE constraint
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{ArticleStatus, Article, Category, Locale, LocalizedText, User, UserRole};
    use chrono::Utc;

    /// Fresh in-memory database with all migrations applied
    pub async fn setup_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        pool
    }

    pub fn new_user(name: &str, role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: 0,
            username: name.to_string(),
            email: format!("{}@example.com", name),
            password_hash: "hash".to_string(),
            role,
            has_accepted_rules: false,
            preferred_locale: Locale::Uz,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub async fn seed_user(pool: &DynDatabasePool, name: &str, role: UserRole) -> User {
        SqlxUserRepository::new(pool.clone())
            .create(&new_user(name, role))
            .await
            .unwrap()
    }

    pub async fn seed_category(pool: &DynDatabasePool, slug: &str) -> Category {
        SqlxCategoryRepository::new(pool.clone())
            .create(slug, &LocalizedText::new(slug), None)
            .await
            .unwrap()
    }

    pub async fn seed_article(
        pool: &DynDatabasePool,
        author_id: i64,
        category_id: i64,
        slug: &str,
    ) -> Article {
        let article = NewArticle {
            slug: slug.to_string(),
            title: LocalizedText::new(slug).with_en(slug),
            content: LocalizedText::new(format!("{} matni", slug)),
            author_id,
            category_id,
            cover_image: None,
            attachment: None,
            keywords: Vec::new(),
        };
        SqlxArticleRepository::new(pool.clone())
            .create(&article)
            .await
            .unwrap()
    }

    /// Move an article to a status directly, bypassing the workflow
    pub async fn force_status(pool: &DynDatabasePool, article_id: i64, status: ArticleStatus) {
        let now = Utc::now();
        let published_at = (status == ArticleStatus::Approved).then_some(now);
        sqlx::query("UPDATE articles SET status = ?, published_at = ?, submitted_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(published_at)
            .bind(now)
            .bind(article_id)
            .execute(pool.as_sqlite().unwrap())
            .await
            .unwrap();
    }
}
