//! Category service
//!
//! Category management and reviewer assignment. Assigning a reviewer
//! records a `CategoryAssigned` notification for them.

use crate::db::repositories::{CategoryRepository, UserRepository};
use crate::models::{
    Category, CreateCategoryInput, NotificationKind, UpdateCategoryInput, User,
};
use crate::services::directory::Directory;
use crate::services::messages::MessageContext;
use crate::services::notification::NotificationDispatcher;
use crate::services::policy::Actor;
use crate::services::slug::{generate_slug, with_suffix};
use anyhow::Context;
use std::sync::Arc;

const MAX_NAME_LENGTH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CategoryServiceError {
    #[error("Category slug already exists: {0}")]
    DuplicateSlug(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct CategoryService {
    categories: Arc<dyn CategoryRepository>,
    users: Arc<dyn UserRepository>,
    directory: Arc<Directory>,
    notifier: Arc<NotificationDispatcher>,
}

impl CategoryService {
    pub fn new(
        categories: Arc<dyn CategoryRepository>,
        users: Arc<dyn UserRepository>,
        directory: Arc<Directory>,
        notifier: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            categories,
            users,
            directory,
            notifier,
        }
    }

    /// Create a category. Without an explicit slug one is generated from
    /// the English name, or the Uzbek name when there is no English one.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        require_admin(actor)?;
        let name = input.name.normalized();
        validate_name(&name.uz)?;
        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let slug = match input.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(requested) => {
                let slug = generate_slug(requested);
                if self.slug_taken(&slug).await? {
                    return Err(CategoryServiceError::DuplicateSlug(slug));
                }
                slug
            }
            None => {
                let base = generate_slug(name.en.as_deref().unwrap_or(&name.uz));
                let mut candidate = base.clone();
                let mut n = 1;
                while self.slug_taken(&candidate).await? {
                    n += 1;
                    candidate = with_suffix(&base, n);
                }
                candidate
            }
        };

        let category = self
            .categories
            .create(&slug, &name, description.as_deref())
            .await
            .context("Failed to create category")?;
        tracing::info!(category_id = category.id, slug = %category.slug, "Category created");
        Ok(category)
    }

    /// Update name, description or active flag. The slug never changes.
    pub async fn update(
        &self,
        actor: &Actor,
        id: i64,
        input: UpdateCategoryInput,
    ) -> Result<Category, CategoryServiceError> {
        require_admin(actor)?;
        let mut category = self.load(id).await?;

        if let Some(name) = input.name {
            let name = name.normalized();
            validate_name(&name.uz)?;
            category.name = name;
        }
        if let Some(description) = input.description {
            let description = description.trim().to_string();
            category.description = (!description.is_empty()).then_some(description);
        }
        if let Some(active) = input.is_active {
            category.is_active = active;
        }

        Ok(self
            .categories
            .update(&category)
            .await
            .context("Failed to update category")?)
    }

    /// Every category, including inactive ones (admin)
    pub async fn list_all(&self, actor: &Actor) -> Result<Vec<Category>, CategoryServiceError> {
        require_admin(actor)?;
        Ok(self
            .categories
            .list(true)
            .await
            .context("Failed to list categories")?)
    }

    /// Categories shown publicly
    pub async fn list_active(&self) -> Result<Vec<Category>, CategoryServiceError> {
        Ok(self
            .categories
            .list(false)
            .await
            .context("Failed to list categories")?)
    }

    /// Make `user_id` a reviewer of the category and tell them about it.
    /// Assigning an existing reviewer again changes nothing.
    pub async fn assign_reviewer(
        &self,
        actor: &Actor,
        category_id: i64,
        user_id: i64,
    ) -> Result<(), CategoryServiceError> {
        require_admin(actor)?;
        let category = self.load(category_id).await?;
        let user = self.load_user(user_id).await?;

        if !user.is_reviewer() {
            return Err(CategoryServiceError::ValidationError(format!(
                "{} is not a reviewer",
                user.username
            )));
        }
        if !user.is_active {
            return Err(CategoryServiceError::ValidationError(format!(
                "{} is deactivated",
                user.username
            )));
        }

        let added = self
            .categories
            .add_reviewer(category_id, user_id)
            .await
            .context("Failed to assign reviewer")?;
        if !added {
            return Ok(());
        }
        tracing::info!(category_id, reviewer_id = user_id, "Reviewer assigned to category");

        let ctx = MessageContext {
            category_name: category.name.get(user.preferred_locale),
            ..Default::default()
        };
        let notification =
            self.notifier
                .compose(&user, NotificationKind::CategoryAssigned, &ctx, None, None);
        self.notifier
            .notify(&user, notification)
            .await
            .context("Failed to notify reviewer")?;
        Ok(())
    }

    pub async fn unassign_reviewer(
        &self,
        actor: &Actor,
        category_id: i64,
        user_id: i64,
    ) -> Result<(), CategoryServiceError> {
        require_admin(actor)?;
        let removed = self
            .categories
            .remove_reviewer(category_id, user_id)
            .await
            .context("Failed to unassign reviewer")?;
        if !removed {
            return Err(CategoryServiceError::NotFound(
                "Reviewer is not assigned to this category".to_string(),
            ));
        }
        tracing::info!(category_id, reviewer_id = user_id, "Reviewer removed from category");
        Ok(())
    }

    /// Active reviewers assigned to the category
    pub async fn reviewers(
        &self,
        actor: &Actor,
        category_id: i64,
    ) -> Result<Vec<User>, CategoryServiceError> {
        require_admin(actor)?;
        self.load(category_id).await?;
        Ok(self.directory.reviewers_for_category(category_id).await?)
    }

    async fn load(&self, id: i64) -> Result<Category, CategoryServiceError> {
        self.categories
            .get_by_id(id)
            .await
            .context("Failed to load category")?
            .ok_or_else(|| CategoryServiceError::NotFound("Category not found".to_string()))
    }

    async fn load_user(&self, id: i64) -> Result<User, CategoryServiceError> {
        self.users
            .get_by_id(id)
            .await
            .context("Failed to load user")?
            .ok_or_else(|| CategoryServiceError::NotFound("User not found".to_string()))
    }

    async fn slug_taken(&self, slug: &str) -> Result<bool, CategoryServiceError> {
        Ok(self
            .categories
            .exists_by_slug(slug)
            .await
            .context("Failed to check slug")?)
    }
}

fn require_admin(actor: &Actor) -> Result<(), CategoryServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(CategoryServiceError::PermissionDenied(
            "Administrator access required".to_string(),
        ))
    }
}

fn validate_name(uz: &str) -> Result<(), CategoryServiceError> {
    if uz.is_empty() {
        return Err(CategoryServiceError::ValidationError(
            "Uzbek name is required".to_string(),
        ));
    }
    if uz.chars().count() > MAX_NAME_LENGTH {
        return Err(CategoryServiceError::ValidationError(format!(
            "Name must be at most {} characters",
            MAX_NAME_LENGTH
        )));
    }
    Ok(())
}
