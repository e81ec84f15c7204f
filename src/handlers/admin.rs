use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::AdminAccess,
    models::UsageResponse,
};

/// Zeroes a user's monthly generation count. Meant to be called by the
/// scheduler that runs the monthly reset.
#[utoipa::path(
    post,
    path = "/api/admin/users/{user_id}/reset-generations",
    params(("user_id" = String, Path, description = "User whose count is reset")),
    responses(
        (status = 200, description = "Count reset", body = UsageResponse),
        (status = 401, description = "Missing or wrong admin token"),
        (status = 404, description = "Unknown user")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn reset_generations(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(user_id): Path<String>,
) -> Result<Json<UsageResponse>> {
    state.quota.reset_monthly_generations(&user_id).await?;
    info!("Monthly generations reset - user={}", user_id);

    let status = state.quota.get_quota_status(&user_id).await?;
    Ok(Json(status))
}
