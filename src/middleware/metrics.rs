use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::{handlers::AppState, services::metrics::RequestTimer};

pub async fn metrics_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    // Route templates keep label cardinality bounded.
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());
    let endpoint = format!("{} {}", request.method(), path);

    let _timer = RequestTimer::new(&state.metrics, endpoint);

    let response = next.run(request).await;

    let status = response.status();
    if status.is_server_error() {
        state.metrics.record_error("server_error");
    } else if status.is_client_error() {
        state.metrics.record_error("client_error");
    }

    response
}
