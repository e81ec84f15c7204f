use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::{
    errors::{AppError, Result},
    handlers::AppState,
};

pub async fn metrics_handler(State(state): State<AppState>) -> Result<Response> {
    let metrics = state
        .metrics
        .render()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to render metrics: {}", e)))?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response())
}
