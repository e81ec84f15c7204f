use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
};
use tracing::{info, warn};

use crate::{
    errors::Result,
    handlers::AppState,
    models::{GenerateCoverRequest, GenerateCoverResponse},
    services::image_client::normalize_reference_image,
};

#[utoipa::path(
    post,
    path = "/api/generate-cover",
    request_body = GenerateCoverRequest,
    responses(
        (status = 200, description = "Cover painted", body = GenerateCoverResponse),
        (status = 400, description = "Missing prompt or unusable reference image"),
        (status = 405, description = "Only POST is supported"),
        (status = 502, description = "Prediction failed upstream"),
        (status = 504, description = "Prediction did not finish in time")
    ),
    tag = "covers"
)]
pub async fn generate_cover(
    State(state): State<AppState>,
    payload: std::result::Result<Json<GenerateCoverRequest>, JsonRejection>,
) -> Result<Json<GenerateCoverResponse>> {
    let Json(request) = payload?;
    let prompt = request.prompt.unwrap_or_default();

    let reference_image = request
        .image_base64
        .as_deref()
        .filter(|image| !image.trim().is_empty())
        .map(|image| normalize_reference_image(image, state.images.max_reference_image_bytes()))
        .transpose()?;

    match state.images.generate_cover(&prompt, reference_image).await {
        Ok(image_url) => {
            state.metrics.record_cover(true);
            info!("Cover generated");
            Ok(Json(GenerateCoverResponse { image_url }))
        }
        Err(e) => {
            state.metrics.record_cover(false);
            state.metrics.record_upstream_error(&e);
            warn!("Cover generation failed: {}", e);
            Err(e)
        }
    }
}
