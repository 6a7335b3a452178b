//! Shared API response types
//!
//! Public responses carry one locale's text with Uzbek fallback. Editing
//! views return the full models with every translation.

use serde::Serialize;

use crate::models::{Article, Category, Locale, PagedResult, User};

/// Article rendered in one locale
#[derive(Debug, Serialize)]
pub struct ArticleResponse {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    /// Locale that was requested
    pub locale: Locale,
    /// Whether the text is a real translation rather than the Uzbek fallback
    pub translated: bool,
    pub author_id: i64,
    pub category_id: i64,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub keywords: Vec<String>,
    pub view_count: i64,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ArticleResponse {
    pub fn localized(article: Article, locale: Locale) -> Self {
        Self {
            id: article.id,
            title: article.title_in(locale).to_string(),
            content: article.content_in(locale).to_string(),
            translated: article.title.has(locale),
            locale,
            slug: article.slug,
            author_id: article.author_id,
            category_id: article.category_id,
            status: article.status.to_string(),
            cover_image: article.cover_image,
            attachment: article.attachment,
            keywords: article.keywords,
            view_count: article.view_count,
            published_at: article.published_at.map(|dt| dt.to_rfc3339()),
            created_at: article.created_at.to_rfc3339(),
            updated_at: article.updated_at.to_rfc3339(),
        }
    }
}

/// Paginated list response
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> From<PagedResult<T>> for PaginatedResponse<T> {
    fn from(result: PagedResult<T>) -> Self {
        Self {
            total_pages: result.total_pages(),
            total: result.total,
            page: result.page,
            page_size: result.per_page,
            items: result.items,
        }
    }
}

/// Category rendered in one locale
#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CategoryResponse {
    pub fn localized(category: Category, locale: Locale) -> Self {
        Self {
            id: category.id,
            name: category.name.get(locale).to_string(),
            slug: category.slug,
            description: category.description,
        }
    }
}

/// User info without credentials
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub has_accepted_rules: bool,
    pub preferred_locale: Locale,
    pub is_active: bool,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            role: user.role.to_string(),
            username: user.username,
            email: user.email,
            has_accepted_rules: user.has_accepted_rules,
            preferred_locale: user.preferred_locale,
            is_active: user.is_active,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArticleStatus, ListParams, LocalizedText};
    use chrono::Utc;

    fn article() -> Article {
        let now = Utc::now();
        Article {
            id: 7,
            slug: "salom".to_string(),
            title: LocalizedText::new("Salom").with_ru("Привет"),
            content: LocalizedText::new("Matn"),
            author_id: 1,
            category_id: 2,
            cover_image: None,
            attachment: None,
            keywords: vec!["salomlashish".to_string()],
            status: ArticleStatus::Approved,
            reviewer_id: Some(3),
            revision_note: None,
            view_count: 5,
            created_at: now,
            updated_at: now,
            submitted_at: Some(now),
            published_at: Some(now),
        }
    }

    #[test]
    fn test_localized_article_falls_back_to_uzbek() {
        let ru = ArticleResponse::localized(article(), Locale::Ru);
        assert_eq!(ru.title, "Привет");
        assert_eq!(ru.content, "Matn");
        assert!(ru.translated);

        let en = ArticleResponse::localized(article(), Locale::En);
        assert_eq!(en.title, "Salom");
        assert!(!en.translated);
        assert_eq!(en.status, "approved");
    }

    #[test]
    fn test_paginated_response() {
        let page: PaginatedResponse<i32> =
            PagedResult::new(vec![1, 2], 25, &ListParams::new(2, 10)).into();
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, 10);
    }
}
