use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use tracing::info;

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::{GenerateStoryRequest, StoryBook, StoryBookRequest, StoryResult},
    services::story_formatter::build_prompt,
};

/// Generates a story without touching the caller's quota.
#[utoipa::path(
    post,
    path = "/api/generate-story",
    request_body = GenerateStoryRequest,
    responses(
        (status = 200, description = "Story generated", body = StoryResult),
        (status = 400, description = "Missing or invalid fields"),
        (status = 405, description = "Only POST is supported"),
        (status = 429, description = "Upstream rate limited, retry later"),
        (status = 502, description = "Upstream failure")
    ),
    tag = "stories"
)]
pub async fn generate_story(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateStoryRequest>, JsonRejection>,
) -> Result<Json<StoryResult>> {
    let Json(request) = payload?;
    let (prompt, fallback_name) = resolve_prompt(&request)?;

    let story = state
        .chat
        .generate_story(&prompt, &fallback_name)
        .await
        .map_err(|e| {
            state.metrics.record_upstream_error(&e);
            e
        })?;

    state.metrics.record_story();
    info!("Story generated - title_chars={}", story.title.chars().count());

    Ok(Json(story))
}

/// Structured fields win; a bare prompt is only used when none are sent.
fn resolve_prompt(request: &GenerateStoryRequest) -> Result<(String, String)> {
    let structured = request.name.is_some() || request.gender.is_some() || request.keywords.is_some();

    if !structured {
        if let Some(prompt) = request.prompt.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            return Ok((prompt.to_string(), String::new()));
        }
    }

    let name = request.name.as_deref().unwrap_or_default();
    let prompt = build_prompt(
        name,
        request.gender.as_deref().unwrap_or_default(),
        request.keywords.as_deref().unwrap_or_default(),
    )?;

    Ok((prompt, name.trim().to_string()))
}

/// Quota-checked story and cover generation for a signed-in user.
#[utoipa::path(
    post,
    path = "/api/stories",
    request_body = StoryBookRequest,
    responses(
        (status = 200, description = "Story generated; the cover may have failed", body = StoryBook),
        (status = 400, description = "Missing or invalid fields"),
        (status = 401, description = "Missing or invalid session"),
        (status = 402, description = "Monthly allowance used up"),
        (status = 503, description = "Quota could not be checked")
    ),
    security(("bearer" = [])),
    tag = "stories"
)]
pub async fn create_story_book(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: std::result::Result<Json<StoryBookRequest>, JsonRejection>,
) -> Result<Json<StoryBook>> {
    let Json(request) = payload?;

    let book = state
        .story_books
        .create_story_book(&user.user_id, request)
        .await?;

    Ok(Json(book))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn request(name: Option<&str>, prompt: Option<&str>) -> GenerateStoryRequest {
        GenerateStoryRequest {
            name: name.map(str::to_string),
            gender: name.map(|_| "girl".to_string()),
            keywords: name.map(|_| "dragons, rain".to_string()),
            prompt: prompt.map(str::to_string),
        }
    }

    #[test]
    fn test_structured_fields_build_prompt() {
        let (prompt, fallback) = resolve_prompt(&request(Some(" Mia "), Some("ignored"))).unwrap();
        assert!(prompt.contains("Mia"));
        assert!(!prompt.contains("ignored"));
        assert_eq!(fallback, "Mia");
    }

    #[test]
    fn test_bare_prompt_is_passed_through() {
        let (prompt, fallback) = resolve_prompt(&request(None, Some("A story about a brave bunny"))).unwrap();
        assert_eq!(prompt, "A story about a brave bunny");
        assert_eq!(fallback, "");
    }

    #[test]
    fn test_empty_request_is_rejected() {
        assert!(matches!(
            resolve_prompt(&GenerateStoryRequest::default()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            resolve_prompt(&request(None, Some("   "))),
            Err(AppError::Validation(_))
        ));
    }
}
