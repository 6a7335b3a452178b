//! Article service
//!
//! Authoring, reading and listing articles. Status is never changed here;
//! every status transition goes through the workflow engine.

use crate::db::repositories::{
    is_unique_violation, ArticleContent, ArticleRepository, CategoryRepository, NewArticle,
    UserRepository,
};
use crate::models::{
    parse_keywords, Article, ArticleQuery, ArticleStatus, CreateArticleInput, Keyword,
    ListParams, LocalizedText, PagedResult, StatusCounts, UpdateArticleInput, UserRole,
    MAX_KEYWORDS_PER_ARTICLE, MAX_KEYWORD_LENGTH,
};
use crate::services::directory::Directory;
use crate::services::policy::{self, Actor};
use crate::services::slug::{generate_slug, with_suffix};
use anyhow::Context;
use serde::Serialize;
use std::sync::Arc;

/// Longest title in any locale, in characters
pub const MAX_TITLE_LENGTH: usize = 255;

const MAX_MEDIA_PATH_LENGTH: usize = 500;

/// Inserts retried when another article takes the chosen slug first
const SLUG_RETRIES: u32 = 5;

/// Most keywords returned by one listing
pub const MAX_KEYWORD_LISTING: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum ArticleServiceError {
    #[error("Article not found")]
    NotFound,

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Per-role user counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleCounts {
    pub reader: i64,
    pub author: i64,
    pub reviewer: i64,
    pub admin: i64,
}

/// Admin dashboard figures
#[derive(Debug, Clone, Serialize)]
pub struct DashboardStats {
    pub articles: StatusCounts,
    pub users: RoleCounts,
}

pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
    directory: Arc<Directory>,
}

impl ArticleService {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
        directory: Arc<Directory>,
    ) -> Self {
        Self {
            articles,
            categories,
            users,
            directory,
        }
    }

    /// Create a draft owned by `actor`
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        if !policy::can_create_article(actor) {
            return Err(ArticleServiceError::Permission(
                "Only authors can write articles".to_string(),
            ));
        }

        let title = input.title.normalized();
        let content = input.content.normalized();
        validate_text(&title, &content)?;
        let cover_image = normalize_media_path(input.cover_image, "Cover image")?;
        let attachment = normalize_media_path(input.attachment, "Attachment")?;
        let keywords = normalize_keywords(input.keywords.as_deref())?;
        self.ensure_category(input.category_id).await?;

        let base = generate_slug(&title.uz);
        let mut n = self.first_free_suffix(&base).await?;
        let mut new_article = NewArticle {
            slug: String::new(),
            title,
            content,
            author_id: actor.id,
            category_id: input.category_id,
            cover_image,
            attachment,
            keywords,
        };
        let mut retries = 0;
        let article = loop {
            new_article.slug = numbered_slug(&base, n);
            match self.articles.create(&new_article).await {
                Ok(article) => break article,
                Err(e) if retries < SLUG_RETRIES && is_unique_violation(&e) => {
                    tracing::debug!(slug = %new_article.slug, "Slug taken concurrently");
                    retries += 1;
                    n += 1;
                }
                Err(e) => return Err(e.context("Failed to create article").into()),
            }
        };

        tracing::info!(article_id = article.id, author_id = actor.id, "Article created");
        Ok(article)
    }

    /// Edit a draft or an article with requested changes. The slug and
    /// status never change here.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateArticleInput,
    ) -> Result<Article, ArticleServiceError> {
        let article = self.load(id).await?;

        if !policy::owns(actor, &article) {
            return Err(ArticleServiceError::Permission(
                "Only the author can edit this article".to_string(),
            ));
        }
        if !article.status.is_editable() {
            return Err(ArticleServiceError::State(format!(
                "Cannot edit an article that is {}",
                article.status
            )));
        }
        if !input.has_changes() {
            return Err(ArticleServiceError::Validation("Nothing to update".to_string()));
        }

        let title = input.title.unwrap_or(article.title).normalized();
        let content = input.content.unwrap_or(article.content).normalized();
        validate_text(&title, &content)?;

        let category_id = match input.category_id {
            Some(category_id) if category_id != article.category_id => {
                self.ensure_category(category_id).await?;
                category_id
            }
            _ => article.category_id,
        };
        let cover_image = match input.cover_image {
            Some(cover) => normalize_media_path(Some(cover), "Cover image")?,
            None => article.cover_image,
        };
        let attachment = match input.attachment {
            Some(file) => normalize_media_path(Some(file), "Attachment")?,
            None => article.attachment,
        };
        let keywords = match input.keywords.as_deref() {
            Some(raw) => normalize_keywords(Some(raw))?,
            None => article.keywords,
        };

        self.articles
            .update_content(
                id,
                &ArticleContent {
                    title,
                    content,
                    category_id,
                    cover_image,
                    attachment,
                    keywords,
                },
            )
            .await
            .context("Failed to update article")?
            .ok_or_else(|| ArticleServiceError::State("Article changed concurrently".to_string()))
    }

    /// Delete an unpublished article. Authors delete their own, admins any.
    pub async fn delete(&self, actor: &Actor, id: i64) -> Result<(), ArticleServiceError> {
        let article = self.load(id).await?;

        if !policy::may_delete(actor, &article) {
            return Err(ArticleServiceError::Permission(
                "You cannot delete this article".to_string(),
            ));
        }
        if !policy::is_deletable(article.status) {
            return Err(ArticleServiceError::State(
                "Published articles cannot be deleted".to_string(),
            ));
        }

        let deleted = self
            .articles
            .delete_unpublished(id)
            .await
            .context("Failed to delete article")?;
        if !deleted {
            return Err(ArticleServiceError::State(
                "Article changed concurrently".to_string(),
            ));
        }

        tracing::info!(article_id = id, actor_id = actor.id, "Article deleted");
        Ok(())
    }

    /// Read an article by slug.
    ///
    /// Articles the viewer may not see are reported as not found. Reading a
    /// published article counts a view.
    pub async fn get_for_viewer(
        &self,
        slug: &str,
        viewer: Option<&Actor>,
    ) -> Result<Article, ArticleServiceError> {
        let mut article = self
            .articles
            .get_by_slug(slug)
            .await
            .context("Failed to load article")?
            .ok_or(ArticleServiceError::NotFound)?;

        if !self.visible_to(viewer, &article).await? {
            return Err(ArticleServiceError::NotFound);
        }

        if article.status == ArticleStatus::Approved {
            self.articles
                .increment_view_count(article.id)
                .await
                .context("Failed to count view")?;
            article.view_count += 1;
        }
        Ok(article)
    }

    /// Read an article by id without counting a view
    pub async fn get_by_id_for_viewer(
        &self,
        id: i64,
        viewer: &Actor,
    ) -> Result<Article, ArticleServiceError> {
        let article = self.load(id).await?;
        if !self.visible_to(Some(viewer), &article).await? {
            return Err(ArticleServiceError::NotFound);
        }
        Ok(article)
    }

    /// Public listing
    pub async fn list_published(
        &self,
        params: &ListParams,
        query: &ArticleQuery,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        let (items, total) = self
            .articles
            .list_published(params, query)
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Keywords of published articles, most used first
    pub async fn keywords(
        &self,
        search: Option<&str>,
        limit: u32,
    ) -> Result<Vec<Keyword>, ArticleServiceError> {
        let limit = limit.clamp(1, MAX_KEYWORD_LISTING);
        Ok(self
            .articles
            .keywords(search, i64::from(limit))
            .await
            .context("Failed to list keywords")?)
    }

    /// The actor's own articles with per-status counts
    pub async fn list_by_author(
        &self,
        actor: &Actor,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<(PagedResult<Article>, StatusCounts), ArticleServiceError> {
        let (items, total) = self
            .articles
            .list_by_author(actor.id, status, params)
            .await
            .context("Failed to list articles")?;
        let counts = self
            .articles
            .count_by_status(Some(actor.id))
            .await
            .context("Failed to count articles")?;
        Ok((PagedResult::new(items, total, params), counts))
    }

    /// Admin view of all articles, optionally by status
    pub async fn list_by_status(
        &self,
        actor: &Actor,
        status: Option<ArticleStatus>,
        params: &ListParams,
    ) -> Result<PagedResult<Article>, ArticleServiceError> {
        self.require_admin(actor)?;
        let (items, total) = self
            .articles
            .list_by_status(status, params)
            .await
            .context("Failed to list articles")?;
        Ok(PagedResult::new(items, total, params))
    }

    /// Pending articles a reviewer is responsible for or may pick up
    pub async fn reviewer_queue(&self, actor: &Actor) -> Result<Vec<Article>, ArticleServiceError> {
        if !actor.is_reviewer() {
            return Err(ArticleServiceError::Permission(
                "Only reviewers have a review queue".to_string(),
            ));
        }
        Ok(self
            .articles
            .reviewer_queue(actor.id)
            .await
            .context("Failed to load review queue")?)
    }

    pub async fn reset_views(&self, actor: &Actor, ids: &[i64]) -> Result<u64, ArticleServiceError> {
        self.require_admin(actor)?;
        let reset = self
            .articles
            .reset_view_counts(ids)
            .await
            .context("Failed to reset view counts")?;
        tracing::info!(count = reset, actor_id = actor.id, "View counts reset");
        Ok(reset)
    }

    pub async fn dashboard_stats(&self, actor: &Actor) -> Result<DashboardStats, ArticleServiceError> {
        self.require_admin(actor)?;

        let articles = self
            .articles
            .count_by_status(None)
            .await
            .context("Failed to count articles")?;
        let mut users = RoleCounts::default();
        for (role, count) in self.users.count_by_role().await.context("Failed to count users")? {
            match role {
                UserRole::Reader => users.reader = count,
                UserRole::Author => users.author = count,
                UserRole::Reviewer => users.reviewer = count,
                UserRole::Admin => users.admin = count,
            }
        }

        Ok(DashboardStats { articles, users })
    }

    async fn load(&self, id: i64) -> Result<Article, ArticleServiceError> {
        self.articles
            .get_by_id(id)
            .await
            .context("Failed to load article")?
            .ok_or(ArticleServiceError::NotFound)
    }

    async fn visible_to(
        &self,
        viewer: Option<&Actor>,
        article: &Article,
    ) -> Result<bool, ArticleServiceError> {
        let covers = match viewer {
            Some(v) if v.is_reviewer() && article.status == ArticleStatus::PendingReview => self
                .directory
                .covers_category(v.id, article.category_id)
                .await
                .context("Failed to check reviewer assignment")?,
            _ => false,
        };
        Ok(policy::can_view(viewer, article, covers))
    }

    fn require_admin(&self, actor: &Actor) -> Result<(), ArticleServiceError> {
        if actor.is_admin() {
            Ok(())
        } else {
            Err(ArticleServiceError::Permission(
                "Administrator access required".to_string(),
            ))
        }
    }

    async fn ensure_category(&self, category_id: i64) -> Result<(), ArticleServiceError> {
        let category = self
            .categories
            .get_by_id(category_id)
            .await
            .context("Failed to load category")?;
        match category {
            Some(c) if c.is_active => Ok(()),
            Some(_) => Err(ArticleServiceError::Validation(
                "Category is not accepting articles".to_string(),
            )),
            None => Err(ArticleServiceError::Validation("Category not found".to_string())),
        }
    }

    /// First number `n` for which `numbered_slug(base, n)` is unused
    async fn first_free_suffix(&self, base: &str) -> Result<u32, ArticleServiceError> {
        let mut n = 1;
        while self
            .articles
            .exists_by_slug(&numbered_slug(base, n))
            .await
            .context("Failed to check slug")?
        {
            n += 1;
        }
        Ok(n)
    }
}

fn numbered_slug(base: &str, n: u32) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        with_suffix(base, n)
    }
}

fn validate_text(title: &LocalizedText, content: &LocalizedText) -> Result<(), ArticleServiceError> {
    if title.uz.is_empty() {
        return Err(ArticleServiceError::Validation(
            "Uzbek title is required".to_string(),
        ));
    }
    if content.uz.is_empty() {
        return Err(ArticleServiceError::Validation(
            "Uzbek content is required".to_string(),
        ));
    }
    let titles = [Some(title.uz.as_str()), title.ru.as_deref(), title.en.as_deref()];
    if titles
        .into_iter()
        .flatten()
        .any(|t| t.chars().count() > MAX_TITLE_LENGTH)
    {
        return Err(ArticleServiceError::Validation(format!(
            "Titles must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(())
}

/// Empty string means no file
fn normalize_media_path(
    path: Option<String>,
    what: &str,
) -> Result<Option<String>, ArticleServiceError> {
    let Some(path) = path.map(|p| p.trim().to_string()).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    if path.len() > MAX_MEDIA_PATH_LENGTH {
        return Err(ArticleServiceError::Validation(format!(
            "{} path is too long",
            what
        )));
    }
    Ok(Some(path))
}

fn normalize_keywords(raw: Option<&str>) -> Result<Vec<String>, ArticleServiceError> {
    let keywords = parse_keywords(raw.unwrap_or_default());
    if keywords.len() > MAX_KEYWORDS_PER_ARTICLE {
        return Err(ArticleServiceError::Validation(format!(
            "At most {} keywords per article",
            MAX_KEYWORDS_PER_ARTICLE
        )));
    }
    if let Some(long) = keywords
        .iter()
        .find(|k| k.chars().count() > MAX_KEYWORD_LENGTH)
    {
        return Err(ArticleServiceError::Validation(format!(
            "Keyword is longer than {} characters: {}",
            MAX_KEYWORD_LENGTH, long
        )));
    }
    Ok(keywords)
}
