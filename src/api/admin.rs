//! Admin API endpoints
//!
//! Dashboard, article queue and bulk actions, users, categories with their
//! reviewers, and article rules. Every route sits behind `require_admin`;
//! the services check the role again.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page, AdminPaginationQuery};
use crate::api::articles::parse_status;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{PaginatedResponse, UserResponse};
use crate::api::workflow;
use crate::models::{
    Article, ArticleRules, Category, CreateCategoryInput, CreateRulesInput, CreateUserInput,
    ListParams, UpdateCategoryInput, UserRole,
};
use crate::services::DashboardStats;

/// Most articles a single bulk request may touch
pub const MAX_BULK_ITEMS: usize = 100;

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/articles", get(list_articles))
        .route("/articles/bulk", post(bulk_articles))
        .route("/articles/{id}/assign-reviewer", post(workflow::assign_reviewer))
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}/role", put(set_role))
        .route("/users/{id}/active", put(set_active))
        .route("/categories", get(list_categories).post(create_category))
        .route("/categories/{id}", put(update_category))
        .route("/categories/{id}/reviewers", get(list_reviewers))
        .route(
            "/categories/{id}/reviewers/{user_id}",
            post(assign_category_reviewer).delete(unassign_category_reviewer),
        )
        .route("/rules", get(list_rules).post(create_rules))
        .route("/rules/{id}/activate", post(activate_rules))
}

#[derive(Debug, Deserialize)]
pub struct AdminArticlesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    AssignReviewer,
    ResetViews,
    Delete,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub action: BulkAction,
    pub ids: Vec<i64>,
    /// Required for `assign_reviewer`
    #[serde(default)]
    pub reviewer_id: Option<i64>,
}

/// Outcome for one article of a bulk request
#[derive(Debug, Serialize)]
pub struct BulkItemResult {
    pub id: i64,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BulkItemResult {
    fn from_result<T, E: Into<ApiError>>(id: i64, result: Result<T, E>) -> Self {
        match result {
            Ok(_) => Self {
                id,
                ok: true,
                code: None,
                message: None,
            },
            Err(e) => {
                let e: ApiError = e.into();
                Self {
                    id,
                    ok: false,
                    code: Some(e.error.code),
                    message: Some(e.error.message),
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// GET /api/v1/admin/dashboard
async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.article_service.dashboard_stats(&user.actor()).await?))
}

/// GET /api/v1/admin/articles
async fn list_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AdminArticlesQuery>,
) -> Result<Json<PaginatedResponse<Article>>, ApiError> {
    let status = parse_status(query.status.as_deref())?;
    let params = ListParams::new(query.page, query.per_page);
    let page = state
        .article_service
        .list_by_status(&user.actor(), status, &params)
        .await?;
    Ok(Json(page.into()))
}

/// POST /api/v1/admin/articles/bulk
///
/// Runs the action per article and reports each outcome. Publishing is not a
/// bulk action: only the assigned reviewer approves. `delete` follows the
/// normal deletion policy.
async fn bulk_articles(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkRequest>,
) -> Result<Json<BulkResponse>, ApiError> {
    if body.ids.is_empty() {
        return Err(ApiError::validation_error("No articles selected"));
    }
    if body.ids.len() > MAX_BULK_ITEMS {
        return Err(ApiError::validation_error(format!(
            "At most {} articles per request",
            MAX_BULK_ITEMS
        )));
    }

    let actor = user.actor();
    let mut results = Vec::with_capacity(body.ids.len());
    match body.action {
        BulkAction::AssignReviewer => {
            let reviewer_id = body
                .reviewer_id
                .ok_or_else(|| ApiError::validation_error("reviewer_id is required"))?;
            for &id in &body.ids {
                let outcome = state.workflow.assign_reviewer(id, reviewer_id, &actor).await;
                results.push(BulkItemResult::from_result(id, outcome));
            }
        }
        BulkAction::Delete => {
            for &id in &body.ids {
                let outcome = state.article_service.delete(&actor, id).await;
                results.push(BulkItemResult::from_result(id, outcome));
            }
        }
        BulkAction::ResetViews => {
            state.article_service.reset_views(&actor, &body.ids).await?;
            results.extend(
                body.ids
                    .iter()
                    .map(|&id| BulkItemResult::from_result(id, Ok::<(), ApiError>(()))),
            );
        }
    }

    let succeeded = results.iter().filter(|r| r.ok).count();
    Ok(Json(BulkResponse {
        failed: results.len() - succeeded,
        succeeded,
        results,
    }))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AdminPaginationQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, ApiError> {
    let page = state
        .user_service
        .list_users(&user.actor(), &query.params())
        .await?;
    Ok(Json(page.map(UserResponse::from).into()))
}

/// POST /api/v1/admin/users
async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateUserInput>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let created = state.user_service.create_user(&user.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// PUT /api/v1/admin/users/{id}/role
async fn set_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .user_service
        .set_role(&user.actor(), id, body.role)
        .await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/admin/users/{id}/active
async fn set_active(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .user_service
        .set_active(&user.actor(), id, body.is_active)
        .await?;
    Ok(Json(updated.into()))
}

/// GET /api/v1/admin/categories
async fn list_categories(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.category_service.list_all(&user.actor()).await?))
}

/// POST /api/v1/admin/categories
async fn create_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateCategoryInput>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    let category = state.category_service.create(&user.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/v1/admin/categories/{id}
async fn update_category(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryInput>,
) -> Result<Json<Category>, ApiError> {
    Ok(Json(
        state.category_service.update(&user.actor(), id, body).await?,
    ))
}

/// GET /api/v1/admin/categories/{id}/reviewers
async fn list_reviewers(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let reviewers = state.category_service.reviewers(&user.actor(), id).await?;
    Ok(Json(reviewers.into_iter().map(UserResponse::from).collect()))
}

/// POST /api/v1/admin/categories/{id}/reviewers/{user_id}
async fn assign_category_reviewer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .category_service
        .assign_reviewer(&user.actor(), id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/admin/categories/{id}/reviewers/{user_id}
async fn unassign_category_reviewer(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path((id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, ApiError> {
    state
        .category_service
        .unassign_reviewer(&user.actor(), id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/admin/rules
async fn list_rules(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<ArticleRules>>, ApiError> {
    Ok(Json(state.rules_service.list(&user.actor()).await?))
}

/// POST /api/v1/admin/rules
async fn create_rules(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateRulesInput>,
) -> Result<(StatusCode, Json<ArticleRules>), ApiError> {
    let rules = state.rules_service.create(&user.actor(), body).await?;
    Ok((StatusCode::CREATED, Json(rules)))
}

/// POST /api/v1/admin/rules/{id}/activate
async fn activate_rules(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleRules>, ApiError> {
    Ok(Json(state.rules_service.activate(&user.actor(), id).await?))
}
