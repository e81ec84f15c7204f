use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    errors::{AppError, Result},
    models::{StoryBook, StoryBookRequest},
    services::{
        chat_client::ChatClient,
        image_client::{normalize_reference_image, ImageClient},
        metrics::MetricsService,
        quota_manager::QuotaManager,
        story_formatter::{build_cover_prompt, build_prompt},
    },
};

/// Runs the full generation flow for one signed-in user: quota check,
/// story and cover generation, then usage recording.
#[derive(Clone)]
pub struct StoryBookService {
    chat: ChatClient,
    images: ImageClient,
    quota: QuotaManager,
    metrics: Arc<MetricsService>,
}

impl StoryBookService {
    pub fn new(
        chat: ChatClient,
        images: ImageClient,
        quota: QuotaManager,
        metrics: Arc<MetricsService>,
    ) -> Self {
        Self {
            chat,
            images,
            quota,
            metrics,
        }
    }

    pub async fn create_story_book(&self, user_id: &str, request: StoryBookRequest) -> Result<StoryBook> {
        self.quota.register_user(user_id).await?;

        if let Err(e) = self.quota.require_generation_allowed(user_id).await {
            let reason = match e {
                AppError::StoreUnavailable(_) => "store_unavailable",
                _ => "limit",
            };
            self.metrics.record_quota_denial(reason);
            return Err(e);
        }

        let name = request.name.as_deref().unwrap_or_default();
        let gender = request.gender.as_deref().unwrap_or_default();
        let keywords = request.keywords.as_deref().unwrap_or_default();

        let story_prompt = build_prompt(name, gender, keywords)?;
        let cover_prompt = build_cover_prompt(name, gender, keywords)?;
        let reference_image = request
            .image_base64
            .as_deref()
            .filter(|image| !image.trim().is_empty())
            .map(|image| normalize_reference_image(image, self.images.max_reference_image_bytes()))
            .transpose()?;

        info!("Generating story book - user={}", user_id);

        let (story, cover) = tokio::join!(
            self.chat.generate_story(&story_prompt, name.trim()),
            self.images.generate_cover(&cover_prompt, reference_image),
        );

        let story = story.map_err(|e| {
            self.metrics.record_upstream_error(&e);
            e
        })?;
        self.metrics.record_story();

        let (image_url, cover_error) = match cover {
            Ok(url) => {
                self.metrics.record_cover(true);
                (Some(url), None)
            }
            Err(e) => {
                warn!("Cover generation failed for {}: {}", user_id, e);
                self.metrics.record_cover(false);
                self.metrics.record_upstream_error(&e);
                (None, Some(e.user_message()))
            }
        };

        // Logged only: the story is returned either way.
        if let Err(e) = self.quota.record_generation(user_id).await {
            error!("Failed to record generation for {}: {}", user_id, e);
        }

        let usage = self.quota.store().get_usage_stats(user_id).await.ok();

        Ok(StoryBook {
            title: story.title,
            content: story.content,
            image_url,
            cover_error,
            usage,
        })
    }
}
