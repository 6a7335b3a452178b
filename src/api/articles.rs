//! Article API endpoints
//!
//! - GET /api/v1/articles - Published articles, paginated and searchable
//! - GET /api/v1/articles/{slug} - One article, counted as a view when published
//! - POST /api/v1/articles - Create a draft
//! - PUT /api/v1/articles/{id} - Edit a draft or an article with requested changes
//! - DELETE /api/v1/articles/{id} - Delete an unpublished article
//! - GET /api/v1/my/articles - The author's own articles with status counts
//! - GET /api/v1/my/articles/{id} - One article with every translation
//! - GET /api/v1/keywords - Keywords of published articles, most used first

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_page_size, ActiveLocale};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, MaybeUser};
use crate::api::responses::{ArticleResponse, PaginatedResponse};
use crate::models::{
    Article, ArticleQuery, ArticleStatus, CreateArticleInput, Keyword, ListParams, StatusCounts,
    UpdateArticleInput,
};

/// Query parameters for the public listing
#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub category: Option<i64>,
    pub q: Option<String>,
}

/// Query parameters for "my articles"
#[derive(Debug, Deserialize)]
pub struct MyArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    pub status: Option<String>,
}

/// Query parameters for the keyword listing
#[derive(Debug, Deserialize)]
pub struct KeywordsQuery {
    pub q: Option<String>,
    #[serde(default = "default_keyword_limit")]
    pub limit: u32,
}

fn default_keyword_limit() -> u32 {
    20
}

#[derive(Debug, Serialize)]
pub struct MyArticlesResponse {
    #[serde(flatten)]
    pub page: PaginatedResponse<Article>,
    pub counts: StatusCounts,
}

/// Parse an optional status filter
pub(crate) fn parse_status(status: Option<&str>) -> Result<Option<ArticleStatus>, ApiError> {
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => ArticleStatus::from_str(s)
            .map(Some)
            .ok_or_else(|| ApiError::validation_error(format!("Unknown status: {}", s))),
    }
}

/// GET /api/v1/articles
pub async fn list_articles(
    State(state): State<AppState>,
    ActiveLocale(locale): ActiveLocale,
    Query(query): Query<ListArticlesQuery>,
) -> Result<Json<PaginatedResponse<ArticleResponse>>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let filter = ArticleQuery {
        category_id: query.category,
        search: query.q.filter(|q| !q.trim().is_empty()),
        locale,
    };

    let result = state.article_service.list_published(&params, &filter).await?;
    Ok(Json(
        result
            .map(|a| ArticleResponse::localized(a, locale))
            .into(),
    ))
}

/// GET /api/v1/articles/{slug}
///
/// Unpublished articles are visible to their author, admins and the
/// responsible reviewers; to everyone else they do not exist.
pub async fn get_article(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ActiveLocale(locale): ActiveLocale,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .article_service
        .get_for_viewer(&slug, viewer.actor().as_ref())
        .await?;
    Ok(Json(ArticleResponse::localized(article, locale)))
}

/// POST /api/v1/articles
pub async fn create_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateArticleInput>,
) -> Result<(StatusCode, Json<Article>), ApiError> {
    let article = state.article_service.create(&user.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

/// PUT /api/v1/articles/{id}
pub async fn update_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateArticleInput>,
) -> Result<Json<Article>, ApiError> {
    let article = state.article_service.update(&user.actor(), id, body).await?;
    Ok(Json(article))
}

/// DELETE /api/v1/articles/{id}
pub async fn delete_article(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.article_service.delete(&user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/keywords
pub async fn list_keywords(
    State(state): State<AppState>,
    Query(query): Query<KeywordsQuery>,
) -> Result<Json<Vec<Keyword>>, ApiError> {
    let keywords = state
        .article_service
        .keywords(query.q.as_deref(), query.limit)
        .await?;
    Ok(Json(keywords))
}

/// GET /api/v1/my/articles
pub async fn my_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<MyArticlesQuery>,
) -> Result<Json<MyArticlesResponse>, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let params = ListParams::new(query.page, query.page_size);
    let (page, counts) = state
        .article_service
        .list_by_author(&user.actor(), status, &params)
        .await?;
    Ok(Json(MyArticlesResponse {
        page: page.into(),
        counts,
    }))
}

/// GET /api/v1/my/articles/{id} and /api/v1/reviewer/articles/{id}
pub async fn get_article_by_id(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .article_service
        .get_by_id_for_viewer(id, &user.actor())
        .await?;
    Ok(Json(article))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("")).unwrap(), None);
        assert_eq!(
            parse_status(Some("pending_review")).unwrap(),
            Some(ArticleStatus::PendingReview)
        );
        assert!(parse_status(Some("archived")).is_err());
    }
}
