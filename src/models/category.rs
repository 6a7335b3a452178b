//! Category model
//!
//! Categories group articles and scope which reviewers may review them.

use super::LocalizedText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: i64,
    /// URL-friendly slug
    pub slug: String,
    pub name: LocalizedText,
    pub description: Option<String>,
    /// Inactive categories accept no new articles and are hidden publicly
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub name: LocalizedText,
    /// Generated from the name when absent
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Input for updating a category
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryInput {
    #[serde(default)]
    pub name: Option<LocalizedText>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}
