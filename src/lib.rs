pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::Config,
    handlers::{
        admin, auth as auth_handlers, cover, docs, health, method_not_allowed,
        metrics as metrics_handlers, not_found, story, usage, AppState,
    },
    middleware::metrics_middleware,
};

pub async fn create_app(config: Config) -> anyhow::Result<Router> {
    let state = AppState::new(config).await?;
    Ok(build_router(state))
}

pub fn build_router(state: AppState) -> Router {
    let max_concurrent_requests = state.config.max_concurrent_requests.max(1);
    let body_limit = state.config.image.request_body_limit();

    let api = Router::new()
        .route(
            "/api/generate-story",
            post(story::generate_story).fallback(method_not_allowed),
        )
        .route(
            "/api/generate-cover",
            post(cover::generate_cover).fallback(method_not_allowed),
        )
        .route("/api/stories", post(story::create_story_book))
        .route("/api/auth/anonymous", post(auth_handlers::create_anonymous_session))
        .route("/api/usage", get(usage::get_usage))
        .route("/api/usage/share", post(usage::record_share))
        .route(
            "/api/admin/users/:user_id/reset-generations",
            post(admin::reset_generations),
        )
        .route("/health", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/metrics", get(metrics_handlers::metrics_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics_middleware,
        ));

    Router::new()
        .merge(api)
        .merge(docs::create_docs_router())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(GlobalConcurrencyLimitLayer::new(max_concurrent_requests))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
