//! Role and assignment lookups
//!
//! Read-only questions the workflow asks about people: who administers,
//! who reviews a category, whether a user may review it. Edits to
//! assignments live in the category service.

use crate::db::repositories::{CategoryRepository, UserRepository};
use crate::models::{User, UserRole};
use anyhow::{Context, Result};
use std::sync::Arc;

pub struct Directory {
    users: Arc<dyn UserRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl Directory {
    pub fn new(users: Arc<dyn UserRepository>, categories: Arc<dyn CategoryRepository>) -> Self {
        Self { users, categories }
    }

    pub async fn user(&self, id: i64) -> Result<Option<User>> {
        self.users.get_by_id(id).await.context("Failed to load user")
    }

    /// Active administrators, the recipients of submission notices
    pub async fn admins(&self) -> Result<Vec<User>> {
        self.users
            .list_by_role(UserRole::Admin)
            .await
            .context("Failed to list admins")
    }

    /// Active reviewers assigned to the category. May be empty.
    pub async fn reviewers_for_category(&self, category_id: i64) -> Result<Vec<User>> {
        let ids = self
            .categories
            .reviewer_ids(category_id)
            .await
            .context("Failed to list category reviewers")?;

        let mut reviewers = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.user(id).await? {
                if user.is_reviewer() && user.is_active {
                    reviewers.push(user);
                }
            }
        }
        Ok(reviewers)
    }

    /// Whether `user` may review articles in the category
    pub async fn is_qualified(&self, user: &User, category_id: i64) -> Result<bool> {
        if !user.is_reviewer() || !user.is_active {
            return Ok(false);
        }
        self.covers_category(user.id, category_id).await
    }

    /// Whether the user is assigned to the category, whatever their role
    pub async fn covers_category(&self, user_id: i64, category_id: i64) -> Result<bool> {
        self.categories
            .is_reviewer_assigned(category_id, user_id)
            .await
            .context("Failed to check reviewer assignment")
    }
}
