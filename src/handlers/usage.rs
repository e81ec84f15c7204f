use axum::{extract::State, response::Json};

use crate::{
    errors::Result,
    handlers::AppState,
    middleware::AuthenticatedUser,
    models::UsageResponse,
};

#[utoipa::path(
    get,
    path = "/api/usage",
    responses(
        (status = 200, description = "Current usage and whether another story is allowed", body = UsageResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 503, description = "Quota store unavailable")
    ),
    security(("bearer" = [])),
    tag = "usage"
)]
pub async fn get_usage(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UsageResponse>> {
    // Tokens outlive a wiped store; recreate the record instead of 404ing.
    state.quota.register_user(&user.user_id).await?;
    let status = state.quota.get_quota_status(&user.user_id).await?;
    Ok(Json(status))
}

/// Records one share of the app, which counts towards the bonus allowance.
#[utoipa::path(
    post,
    path = "/api/usage/share",
    responses(
        (status = 200, description = "Share recorded", body = UsageResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 503, description = "Quota store unavailable")
    ),
    security(("bearer" = [])),
    tag = "usage"
)]
pub async fn record_share(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UsageResponse>> {
    state.quota.register_user(&user.user_id).await?;
    let status = state.quota.record_share(&user.user_id).await?;
    state.metrics.record_share();
    Ok(Json(status))
}
