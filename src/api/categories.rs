//! Public category and rules endpoints
//!
//! - GET /api/v1/categories - Active categories in the requested locale
//! - GET /api/v1/rules/active - The rules authors must accept

use axum::{extract::State, Json};

use crate::api::common::ActiveLocale;
use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::CategoryResponse;
use crate::models::ArticleRules;

/// GET /api/v1/categories
pub async fn list_categories(
    State(state): State<AppState>,
    ActiveLocale(locale): ActiveLocale,
) -> Result<Json<Vec<CategoryResponse>>, ApiError> {
    let categories = state.category_service.list_active().await?;
    Ok(Json(
        categories
            .into_iter()
            .map(|c| CategoryResponse::localized(c, locale))
            .collect(),
    ))
}

/// GET /api/v1/rules/active
pub async fn active_rules(State(state): State<AppState>) -> Result<Json<ArticleRules>, ApiError> {
    state
        .rules_service
        .get_active()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No active rules"))
}
