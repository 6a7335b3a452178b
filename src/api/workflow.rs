//! Editorial workflow endpoints
//!
//! Thin wrappers over the workflow engine; all permission and state checks
//! happen there.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Article, StatusChange};

#[derive(Debug, Deserialize)]
pub struct RequestChangesBody {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignReviewerBody {
    pub reviewer_id: i64,
}

/// POST /api/v1/articles/{id}/submit
pub async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let rules = state.rules_service.get_active().await?;
    let article = state
        .workflow
        .submit(id, &user.actor(), rules.as_ref())
        .await?;
    Ok(Json(article))
}

/// POST /api/v1/articles/{id}/resubmit
pub async fn resubmit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    let rules = state.rules_service.get_active().await?;
    let article = state
        .workflow
        .resubmit(id, &user.actor(), rules.as_ref())
        .await?;
    Ok(Json(article))
}

/// POST /api/v1/articles/{id}/approve
pub async fn approve(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Article>, ApiError> {
    Ok(Json(state.workflow.approve(id, &user.actor()).await?))
}

/// POST /api/v1/articles/{id}/request-changes
pub async fn request_changes(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<RequestChangesBody>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .workflow
        .request_changes(id, &user.actor(), &body.note)
        .await?;
    Ok(Json(article))
}

/// GET /api/v1/articles/{id}/history
pub async fn history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StatusChange>>, ApiError> {
    Ok(Json(state.workflow.history(id, &user.actor()).await?))
}

/// POST /api/v1/admin/articles/{id}/assign-reviewer
pub async fn assign_reviewer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<AssignReviewerBody>,
) -> Result<Json<Article>, ApiError> {
    let article = state
        .workflow
        .assign_reviewer(id, body.reviewer_id, &user.actor())
        .await?;
    Ok(Json(article))
}

/// GET /api/v1/reviewer/queue
pub async fn reviewer_queue(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Article>>, ApiError> {
    Ok(Json(state.article_service.reviewer_queue(&user.actor()).await?))
}
