//! Article rules service

use crate::db::repositories::RulesRepository;
use crate::models::{ArticleRules, CreateRulesInput};
use crate::services::policy::Actor;
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RulesServiceError {
    #[error("Rules not found")]
    NotFound,

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub struct RulesService {
    repo: Arc<dyn RulesRepository>,
}

impl RulesService {
    pub fn new(repo: Arc<dyn RulesRepository>) -> Self {
        Self { repo }
    }

    /// Publish a new rules version
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateRulesInput,
    ) -> Result<ArticleRules, RulesServiceError> {
        require_admin(actor)?;

        let title = input.title.normalized();
        let content = input.content.normalized();
        if title.uz.is_empty() || content.uz.is_empty() {
            return Err(RulesServiceError::Validation(
                "Uzbek title and content are required".to_string(),
            ));
        }

        let rules = self
            .repo
            .create(&title, &content, input.activate)
            .await
            .context("Failed to create rules")?;
        tracing::info!(
            rules_id = rules.id,
            version = rules.version,
            active = rules.is_active,
            "Rules version created"
        );
        Ok(rules)
    }

    /// Make a version the active one. Earlier acceptances stay valid.
    pub async fn activate(&self, actor: &Actor, id: i64) -> Result<ArticleRules, RulesServiceError> {
        require_admin(actor)?;
        let rules = self
            .repo
            .activate(id)
            .await
            .context("Failed to activate rules")?
            .ok_or(RulesServiceError::NotFound)?;
        tracing::info!(rules_id = id, version = rules.version, "Rules version activated");
        Ok(rules)
    }

    pub async fn list(&self, actor: &Actor) -> Result<Vec<ArticleRules>, RulesServiceError> {
        require_admin(actor)?;
        Ok(self.repo.list().await.context("Failed to list rules")?)
    }

    pub async fn get_active(&self) -> Result<Option<ArticleRules>, RulesServiceError> {
        Ok(self
            .repo
            .get_active()
            .await
            .context("Failed to load active rules")?)
    }
}

fn require_admin(actor: &Actor) -> Result<(), RulesServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(RulesServiceError::Permission(
            "Administrator access required".to_string(),
        ))
    }
}
