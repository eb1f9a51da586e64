// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, catalog, results, sessions},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Catalog and article feed are public.
/// * Sessions, results and history require a bearer token.
/// * Admin routes additionally require the admin role.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
        HeaderValue::from_static("http://localhost:5173"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth = middleware::from_fn_with_state(state.config.clone(), auth_middleware);

    let catalog_routes = Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/tests", get(catalog::list_tests))
        .route("/papers", get(catalog::list_papers));

    let session_routes = Router::new()
        .route("/", post(sessions::start_session))
        .route("/{attempt_id}", get(sessions::get_session))
        .route(
            "/{attempt_id}/answers/{question_id}",
            put(sessions::select_answer).delete(sessions::clear_answer),
        )
        .route("/{attempt_id}/marks/{question_id}", post(sessions::toggle_mark))
        .route("/{attempt_id}/navigate", post(sessions::navigate))
        .route("/{attempt_id}/submit", post(sessions::submit_session))
        .layer(auth.clone());

    let result_routes = Router::new()
        .route("/{attempt_id}", get(results::get_result))
        .layer(auth.clone());

    let attempt_routes = Router::new()
        .route("/", get(results::list_attempts))
        .layer(auth.clone());

    let admin_routes = Router::new()
        .route("/fetch-news", post(admin::fetch_news))
        .route("/generate-test", post(admin::generate_test))
        .route("/settings", get(admin::list_settings))
        .route("/settings/{key}", put(admin::put_setting))
        // Auth runs first, then the admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth);

    Router::new()
        .nest("/api/catalog", catalog_routes)
        .route("/api/articles", get(catalog::list_articles))
        .nest("/api/sessions", session_routes)
        .nest("/api/results", result_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
