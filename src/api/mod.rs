//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api/v1`; uploaded files under `/media`.
//! Routes fall into three groups:
//! - public (session optional): published articles, keywords, categories, active rules, login
//! - signed-in: authoring, the review workflow, notifications, uploads
//! - admin: dashboard, users, categories, rules and bulk article actions

pub mod admin;
pub mod articles;
pub mod auth;
pub mod categories;
pub mod common;
pub mod middleware;
pub mod notifications;
pub mod responses;
pub mod upload;
pub mod workflow;

use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

use crate::config::Config;
use crate::db::repositories::{
    SqlxArticleRepository, SqlxCategoryRepository, SqlxNotificationRepository,
    SqlxRulesRepository, SqlxSessionRepository, SqlxTransitionStore, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::services::{
    ArticleService, CategoryService, Directory, EmailTemplates, Mailer, NotificationDispatcher,
    RulesService, SiteInfo, UserService, WorkflowEngine,
};

pub use middleware::{ApiError, AppState};

/// Multipart framing allowance on top of the configured file size
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Wire repositories and services into the shared application state
pub fn build_state(
    config: &Config,
    pool: DynDatabasePool,
    mailer: Arc<dyn Mailer>,
) -> anyhow::Result<AppState> {
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let category_repo = SqlxCategoryRepository::boxed(pool.clone());
    let article_repo = SqlxArticleRepository::boxed(pool.clone());
    let rules_repo = SqlxRulesRepository::boxed(pool.clone());
    let notification_repo = SqlxNotificationRepository::boxed(pool.clone());
    let transition_store = SqlxTransitionStore::boxed(pool);

    let templates = EmailTemplates::new(SiteInfo {
        name: config.server.site_name.clone(),
        url: config.server.site_url.trim_end_matches('/').to_string(),
    })
    .context("Failed to build email templates")?;
    let notifications = Arc::new(NotificationDispatcher::new(
        notification_repo,
        mailer,
        Arc::new(templates),
    ));
    let directory = Arc::new(Directory::new(user_repo.clone(), category_repo.clone()));

    let user_service = UserService::new(user_repo.clone(), session_repo, rules_repo.clone())
        .with_session_expiration(config.session.expiration_days);
    let article_service = ArticleService::new(
        article_repo.clone(),
        category_repo.clone(),
        user_repo.clone(),
        directory.clone(),
    );
    let category_service = CategoryService::new(
        category_repo,
        user_repo,
        directory.clone(),
        notifications.clone(),
    );
    let workflow = WorkflowEngine::new(
        article_repo,
        transition_store,
        directory,
        notifications.clone(),
    );

    Ok(AppState {
        user_service: Arc::new(user_service),
        article_service: Arc::new(article_service),
        category_service: Arc::new(category_service),
        rules_service: Arc::new(RulesService::new(rules_repo)),
        workflow: Arc::new(workflow),
        notifications,
        upload_config: Arc::new(config.upload.clone()),
        default_locale: config.server.default_locale,
        session_days: config.session.expiration_days,
    })
}

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let upload_limit = usize::try_from(state.upload_config.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);
    let attachment_limit = usize::try_from(state.upload_config.max_attachment_size)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth but not admin)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route("/articles", post(articles::create_article))
        .route(
            "/articles/{id}",
            axum::routing::put(articles::update_article).delete(articles::delete_article),
        )
        .route("/articles/{id}/history", get(workflow::history))
        .route("/articles/{id}/submit", post(workflow::submit))
        .route("/articles/{id}/resubmit", post(workflow::resubmit))
        .route("/articles/{id}/approve", post(workflow::approve))
        .route("/articles/{id}/request-changes", post(workflow::request_changes))
        .route("/my/articles", get(articles::my_articles))
        .route("/my/articles/{id}", get(articles::get_article_by_id))
        .route("/reviewer/queue", get(workflow::reviewer_queue))
        .route("/reviewer/articles/{id}", get(articles::get_article_by_id))
        .route("/notifications", get(notifications::list))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route(
            "/upload/cover",
            post(upload::upload_cover).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/upload/attachment",
            post(upload::upload_attachment).layer(DefaultBodyLimit::max(attachment_limit)),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid session is picked up when present
    Router::new()
        .route("/articles", get(articles::list_articles))
        .route("/articles/{id}", get(articles::get_article))
        .route("/keywords", get(articles::list_keywords))
        .route("/categories", get(categories::list_categories))
        .route("/rules/active", get(categories::active_rules))
        .nest("/auth", auth::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> anyhow::Result<Router> {
    let origin = cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid CORS origin: {}", cors_origin))?;
    // Cookie-based auth needs credentials
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let media = ServeDir::new(&state.upload_config.path);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/media", media)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{seed_category, setup_pool};
    use crate::services::notification::testing::RecordingMailer;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn setup() -> (Router, DynDatabasePool) {
        let pool = setup_pool().await;
        let config = Config::default();
        let state = build_state(&config, pool.clone(), Arc::new(RecordingMailer::default())).unwrap();
        state
            .user_service
            .bootstrap_admin("admin", "admin@example.com", "admin-password")
            .await
            .unwrap();
        let app = build_router(state, &config.server.cors_origin).unwrap();
        (app, pool)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    async fn login(app: &Router, username: &str, password: &str) -> String {
        let (status, body) = send(
            app,
            "POST",
            "/api/v1/auth/login",
            None,
            Some(json!({ "username_or_email": username, "password": password })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn create_user(app: &Router, admin: &str, username: &str, role: &str) -> String {
        let (status, _) = send(
            app,
            "POST",
            "/api/v1/admin/users",
            Some(admin),
            Some(json!({
                "username": username,
                "email": format!("{}@example.com", username),
                "password": "user-password",
                "role": role,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        login(app, username, "user-password").await
    }

    #[tokio::test]
    async fn test_protected_routes_require_session() {
        let (app, _pool) = setup().await;

        let (status, body) = send(&app, "GET", "/api/v1/my/articles", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");

        let (status, _) = send(&app, "GET", "/api/v1/notifications", Some("bogus"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_reject_non_admins() {
        let (app, _pool) = setup().await;
        let admin = login(&app, "admin", "admin-password").await;
        let author = create_user(&app, &admin, "dilnoza", "author").await;

        let (status, body) = send(&app, "GET", "/api/v1/admin/dashboard", Some(&author), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, body) = send(&app, "GET", "/api/v1/admin/dashboard", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"]["admin"], 1);
        assert_eq!(body["users"]["author"], 1);
    }

    #[tokio::test]
    async fn test_public_listing_is_empty_until_approval() {
        let (app, pool) = setup().await;
        let category = seed_category(&pool, "fan").await;
        let admin = login(&app, "admin", "admin-password").await;
        let author = create_user(&app, &admin, "sardor", "author").await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/articles",
            Some(&author),
            Some(json!({
                "title": { "uz": "Yangi maqola", "en": "New article" },
                "content": { "uz": "Matn" },
                "category_id": category.id,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let slug = created["slug"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", "/api/v1/articles", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);

        // Drafts do not exist for anonymous readers
        let (status, _) = send(&app, "GET", &format!("/api/v1/articles/{}", slug), None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/articles/{}?lang=en", slug),
            Some(&author),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "New article");
    }

    #[tokio::test]
    async fn test_submit_requires_accepted_rules() {
        let (app, pool) = setup().await;
        let category = seed_category(&pool, "tarix").await;
        let admin = login(&app, "admin", "admin-password").await;
        let author = create_user(&app, &admin, "aziz", "author").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/admin/rules",
            Some(&admin),
            Some(json!({
                "title": { "uz": "Qoidalar" },
                "content": { "uz": "Qoidalar matni" },
                "activate": true,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, created) = send(
            &app,
            "POST",
            "/api/v1/articles",
            Some(&author),
            Some(json!({
                "title": { "uz": "Maqola" },
                "content": { "uz": "Matn" },
                "category_id": category.id,
            })),
        )
        .await;
        let id = created["id"].as_i64().unwrap();
        let submit = format!("/api/v1/articles/{}/submit", id);

        let (status, body) = send(&app, "POST", &submit, Some(&author), None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "POLICY_VIOLATION");

        let (status, _) = send(&app, "POST", "/api/v1/auth/accept-rules", Some(&author), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&app, "POST", &submit, Some(&author), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending_review");

        // Second submit is a state conflict
        let (status, body) = send(&app, "POST", &submit, Some(&author), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "INVALID_STATE");

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/articles/{}/history", id),
            Some(&author),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_logout_ends_session() {
        let (app, _pool) = setup().await;
        let admin = login(&app, "admin", "admin-password").await;

        let (status, body) = send(&app, "GET", "/api/v1/auth/me", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "admin");

        let (status, _) = send(&app, "POST", "/api/v1/auth/logout", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "GET", "/api/v1/auth/me", Some(&admin), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_bulk_actions_exclude_publishing() {
        let (app, _pool) = setup().await;
        let admin = login(&app, "admin", "admin-password").await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/admin/articles/bulk",
            Some(&admin),
            Some(json!({ "action": "publish", "ids": [1, 2] })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/admin/articles/bulk",
            Some(&admin),
            Some(json!({ "action": "assign_reviewer", "ids": [1] })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/admin/articles/bulk",
            Some(&admin),
            Some(json!({ "action": "reset_views", "ids": [1, 2] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["succeeded"], 2);
        assert_eq!(body["failed"], 0);
    }

    #[tokio::test]
    async fn test_keywords_round_through_the_api() {
        let (app, pool) = setup().await;
        let category = seed_category(&pool, "fan").await;
        let admin = login(&app, "admin", "admin-password").await;
        let author = create_user(&app, &admin, "nodira", "author").await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/v1/articles",
            Some(&author),
            Some(json!({
                "title": { "uz": "Kvant" },
                "content": { "uz": "Matn" },
                "category_id": category.id,
                "keywords": "Fizika, kvant, FIZIKA",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["keywords"], json!(["fizika", "kvant"]));

        // Drafts contribute no public keywords
        let (status, body) = send(&app, "GET", "/api/v1/keywords", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }
}
