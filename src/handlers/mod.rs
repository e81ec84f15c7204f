use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    config::Config,
    errors::AppError,
    services::{
        create_quota_store, ChatClient, ImageClient, MetricsService, QuotaManager, QuotaPolicy,
        QuotaStore, StoryBookService,
    },
};

pub mod admin;
pub mod auth;
pub mod cover;
pub mod docs;
pub mod health;
pub mod metrics;
pub mod story;
pub mod usage;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub quota: QuotaManager,
    pub chat: ChatClient,
    pub images: ImageClient,
    pub story_books: StoryBookService,
    pub metrics: Arc<MetricsService>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = create_quota_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Builds the state around an already constructed quota store.
    pub fn with_store(config: Config, store: Arc<dyn QuotaStore>) -> anyhow::Result<Self> {
        let metrics = Arc::new(MetricsService::new()?);
        let quota = QuotaManager::new(store, QuotaPolicy::default());
        let chat = ChatClient::new(config.chat.clone())?;
        let images = ImageClient::new(config.image.clone())?;
        let story_books =
            StoryBookService::new(chat.clone(), images.clone(), quota.clone(), metrics.clone());

        Ok(Self {
            config,
            quota,
            chat,
            images,
            story_books,
            metrics,
        })
    }
}

/// Fallback for the POST-only generation routes.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(json!({
            "error": "Method not allowed",
            "status": StatusCode::METHOD_NOT_ALLOWED.as_u16(),
        })),
    )
        .into_response()
}

pub async fn not_found() -> AppError {
    AppError::NotFound("route".to_string())
}
