//! Article rules model
//!
//! Versioned guidelines authors must accept before submitting articles.
//! At most one version is active at a time.

use super::LocalizedText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRules {
    pub id: i64,
    /// Monotonic version number, assigned on creation
    pub version: i64,
    pub title: LocalizedText,
    pub content: LocalizedText,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for publishing a new rules version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRulesInput {
    pub title: LocalizedText,
    pub content: LocalizedText,
    /// Activate immediately, deactivating the current version
    #[serde(default)]
    pub activate: bool,
}
