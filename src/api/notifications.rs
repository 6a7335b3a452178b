//! Notification endpoints
//!
//! Every route acts on the signed-in user's own notifications.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_page_size};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::PaginatedResponse;
use crate::models::{ListParams, Notification};

#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedResponse {
    pub marked: u64,
}

/// GET /api/v1/notifications
pub async fn list(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<NotificationsQuery>,
) -> Result<Json<PaginatedResponse<Notification>>, ApiError> {
    let params = ListParams::new(query.page, query.page_size);
    let page = state
        .notifications
        .list(user.0.id, query.unread, &params)
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let count = state.notifications.unread_count(user.0.id).await?;
    Ok(Json(UnreadCountResponse { count }))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<MarkedResponse>, ApiError> {
    state.notifications.mark_read(id, user.0.id).await?;
    Ok(Json(MarkedResponse { marked: 1 }))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<MarkedResponse>, ApiError> {
    let marked = state.notifications.mark_all_read(user.0.id).await?;
    Ok(Json(MarkedResponse { marked }))
}
