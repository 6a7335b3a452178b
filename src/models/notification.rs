//! Notification model
//!
//! Notifications are append-only; after creation only `is_read` changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// In-app notification addressed to one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Relative URL the notification points at
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub article_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// An author submitted an article (sent to admins)
    ArticleSubmitted,
    /// An author resubmitted after changes (sent to admins and the reviewer)
    ArticleResubmitted,
    /// A reviewer was assigned an article
    ReviewerAssigned,
    /// A reviewer was replaced on an article
    ReviewerUnassigned,
    /// The reviewer asked the author for changes
    ChangesRequested,
    /// The article was approved and published
    ArticlePublished,
    /// A reviewer was assigned to a category
    CategoryAssigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::ArticleSubmitted => "article_submitted",
            NotificationKind::ArticleResubmitted => "article_resubmitted",
            NotificationKind::ReviewerAssigned => "reviewer_assigned",
            NotificationKind::ReviewerUnassigned => "reviewer_unassigned",
            NotificationKind::ChangesRequested => "changes_requested",
            NotificationKind::ArticlePublished => "article_published",
            NotificationKind::CategoryAssigned => "category_assigned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "article_submitted" => Some(NotificationKind::ArticleSubmitted),
            "article_resubmitted" => Some(NotificationKind::ArticleResubmitted),
            "reviewer_assigned" => Some(NotificationKind::ReviewerAssigned),
            "reviewer_unassigned" => Some(NotificationKind::ReviewerUnassigned),
            "changes_requested" => Some(NotificationKind::ChangesRequested),
            "article_published" => Some(NotificationKind::ArticlePublished),
            "category_assigned" => Some(NotificationKind::CategoryAssigned),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub article_id: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip_and_serde() {
        let kinds = [
            NotificationKind::ArticleSubmitted,
            NotificationKind::ArticleResubmitted,
            NotificationKind::ReviewerAssigned,
            NotificationKind::ReviewerUnassigned,
            NotificationKind::ChangesRequested,
            NotificationKind::ArticlePublished,
            NotificationKind::CategoryAssigned,
        ];
        for kind in kinds {
            assert_eq!(NotificationKind::from_str(kind.as_str()), Some(kind));
            assert_eq!(
                serde_json::to_string(&kind).unwrap(),
                format!("\"{}\"", kind.as_str())
            );
        }
        assert_eq!(NotificationKind::from_str("general"), None);
    }
}
