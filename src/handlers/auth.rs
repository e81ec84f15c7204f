use axum::{extract::State, http::StatusCode, response::Json};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::JwtService,
    errors::Result,
    handlers::AppState,
    models::SessionResponse,
};

/// Starts an anonymous session. The returned token identifies the user on
/// every quota-bound request.
#[utoipa::path(
    post,
    path = "/api/auth/anonymous",
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 503, description = "User record could not be created")
    ),
    tag = "auth"
)]
pub async fn create_anonymous_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let user_id = Uuid::new_v4().to_string();

    state.quota.register_user(&user_id).await?;

    let jwt_service = JwtService::new(&state.config.jwt_secret, state.config.session_ttl_days);
    let (token, expires_at) = jwt_service.issue_session(&user_id)?;

    info!("Anonymous session created - user={}", user_id);

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user_id,
            token,
            expires_at,
        }),
    ))
}
