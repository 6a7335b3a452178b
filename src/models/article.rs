//! Article model
//!
//! This module provides:
//! - `Article` entity with multilingual title and content
//! - `ArticleStatus`, the state of the editorial workflow
//! - `StatusChange`, one entry of an article's workflow history
//! - Input types for creating and editing articles
//! - Pagination types for list queries

use super::{Locale, LocalizedText};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Article entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    /// URL-friendly slug derived from the Uzbek title
    pub slug: String,
    pub title: LocalizedText,
    pub content: LocalizedText,
    /// Author user ID, fixed at creation
    pub author_id: i64,
    pub category_id: i64,
    /// Cover image URL
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Attached manuscript (PDF, DOC or DOCX) URL
    #[serde(default)]
    pub attachment: Option<String>,
    /// Lowercased keywords, sorted
    #[serde(default)]
    pub keywords: Vec<String>,
    pub status: ArticleStatus,
    /// Reviewer currently assigned by an admin
    #[serde(default)]
    pub reviewer_id: Option<i64>,
    /// Reviewer's note, present while changes are requested
    #[serde(default)]
    pub revision_note: Option<String>,
    #[serde(default)]
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

impl Article {
    pub fn is_published(&self) -> bool {
        self.status == ArticleStatus::Approved
    }

    /// Title in the given locale (Uzbek fallback)
    pub fn title_in(&self, locale: Locale) -> &str {
        self.title.get(locale)
    }

    /// Content in the given locale (Uzbek fallback)
    pub fn content_in(&self, locale: Locale) -> &str {
        self.content.get(locale)
    }
}

/// Editorial workflow status
///
/// `Draft -> PendingReview -> {Approved, ChangesRequested}`,
/// `ChangesRequested -> PendingReview`. `Approved` means published and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    #[default]
    Draft,
    PendingReview,
    ChangesRequested,
    Approved,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 4] = [
        ArticleStatus::Draft,
        ArticleStatus::PendingReview,
        ArticleStatus::ChangesRequested,
        ArticleStatus::Approved,
    ];

    /// Convert status to database string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Draft => "draft",
            ArticleStatus::PendingReview => "pending_review",
            ArticleStatus::ChangesRequested => "changes_requested",
            ArticleStatus::Approved => "approved",
        }
    }

    /// Parse status from database string representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Some(ArticleStatus::Draft),
            "pending_review" => Some(ArticleStatus::PendingReview),
            "changes_requested" => Some(ArticleStatus::ChangesRequested),
            // "published" is accepted as an alias in query strings
            "approved" | "published" => Some(ArticleStatus::Approved),
            _ => None,
        }
    }

    /// Statuses in which the author may edit content
    pub fn is_editable(&self) -> bool {
        matches!(self, ArticleStatus::Draft | ArticleStatus::ChangesRequested)
    }

    /// Statuses from which the author may submit for review
    pub fn can_submit(&self) -> bool {
        self.is_editable()
    }

    /// Whether the workflow allows moving directly from `self` to `next`
    pub fn can_transition_to(&self, next: ArticleStatus) -> bool {
        use ArticleStatus::*;
        matches!(
            (self, next),
            (Draft, PendingReview)
                | (ChangesRequested, PendingReview)
                | (PendingReview, Approved)
                | (PendingReview, ChangesRequested)
        )
    }
}

impl std::fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded workflow transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub id: i64,
    pub article_id: i64,
    pub from_status: ArticleStatus,
    pub to_status: ArticleStatus,
    /// User who performed the transition
    pub actor_id: i64,
    #[serde(default)]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Article counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub draft: i64,
    pub pending_review: i64,
    pub changes_requested: i64,
    pub approved: i64,
}

impl StatusCounts {
    pub fn set(&mut self, status: ArticleStatus, count: i64) {
        match status {
            ArticleStatus::Draft => self.draft = count,
            ArticleStatus::PendingReview => self.pending_review = count,
            ArticleStatus::ChangesRequested => self.changes_requested = count,
            ArticleStatus::Approved => self.approved = count,
        }
    }

    pub fn total(&self) -> i64 {
        self.draft + self.pending_review + self.changes_requested + self.approved
    }
}

/// Input for creating a new article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateArticleInput {
    pub title: LocalizedText,
    pub content: LocalizedText,
    pub category_id: i64,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub attachment: Option<String>,
    /// Comma-separated keywords
    #[serde(default)]
    pub keywords: Option<String>,
}

/// Input for editing an article; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateArticleInput {
    #[serde(default)]
    pub title: Option<LocalizedText>,
    #[serde(default)]
    pub content: Option<LocalizedText>,
    #[serde(default)]
    pub category_id: Option<i64>,
    /// `Some("")` removes the cover image
    #[serde(default)]
    pub cover_image: Option<String>,
    /// `Some("")` removes the attachment
    #[serde(default)]
    pub attachment: Option<String>,
    /// Replaces all keywords; `Some("")` clears them
    #[serde(default)]
    pub keywords: Option<String>,
}

impl UpdateArticleInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.content.is_some()
            || self.category_id.is_some()
            || self.cover_image.is_some()
            || self.attachment.is_some()
            || self.keywords.is_some()
    }
}

/// Filter for public article listings
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub category_id: Option<i64>,
    /// Case-insensitive search over title, content and keywords
    pub search: Option<String>,
    /// Locale whose columns are searched (Uzbek is always searched too)
    pub locale: Locale,
}

/// Pagination parameters for list queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListParams {
    /// Page number (1-indexed)
    pub page: u32,
    pub per_page: u32,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

impl ListParams {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 100),
        }
    }

    /// Offset for database queries
    pub fn offset(&self) -> i64 {
        (self.page.saturating_sub(1) as i64) * self.per_page as i64
    }

    /// Limit for database queries
    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Paginated result container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total number of items across all pages
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> PagedResult<T> {
    pub fn new(items: Vec<T>, total: i64, params: &ListParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            per_page: params.per_page,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.per_page == 0 {
            return 0;
        }
        (self.total.max(0) as u32).div_ceil(self.per_page)
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Convert every item, keeping pagination data
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PagedResult<U> {
        PagedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}
