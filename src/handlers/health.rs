use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::handlers::AppState;

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Process is up")),
    tag = "health"
)]
pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Dependencies reachable"),
        (status = 503, description = "Quota store unreachable")
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let store_status = match state.quota.store().health_check().await {
        Ok(()) => "healthy",
        Err(e) => {
            tracing::warn!("Readiness check failed: {}", e);
            "unhealthy"
        }
    };

    let chat_status = if state.config.chat.api_key.is_some() { "configured" } else { "missing" };
    let image_status = if state.config.image.api_token.is_some() { "configured" } else { "missing" };

    let (status, overall_status) = if store_status == "healthy" {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status,
        Json(json!({
            "status": overall_status,
            "checks": {
                "quota_store": store_status,
                "chat_credentials": chat_status,
                "image_credentials": image_status
            },
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}
