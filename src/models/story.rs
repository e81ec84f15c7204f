use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserQuota;

/// Title and body extracted from raw model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoryResult {
    pub title: String,
    pub content: String,
}

/// Body of `POST /api/generate-story`. The structured fields are the
/// canonical form; a bare `prompt` is accepted for older clients.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GenerateStoryRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub keywords: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCoverRequest {
    pub prompt: Option<String>,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateCoverResponse {
    pub image_url: String,
}

/// Body of `POST /api/stories`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryBookRequest {
    pub name: Option<String>,
    pub gender: Option<String>,
    pub keywords: Option<String>,
    pub image_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryBook {
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UserQuota>,
}
