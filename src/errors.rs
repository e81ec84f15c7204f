use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rejected request body ({status}): {message}")]
    InvalidBody { status: StatusCode, message: String },

    #[error("Service configuration error: {0}")]
    AuthConfiguration(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("{service} rejected our credentials")]
    UpstreamUnauthorized { service: &'static str },

    #[error("{service} rate limited the request")]
    UpstreamRateLimited { service: &'static str },

    #[error("{service} returned status {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed upstream response: {0}")]
    MalformedResponse(String),

    #[error("Quota store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Image generation failed: {0}")]
    JobFailed(String),

    #[error("Image generation did not finish after {attempts} polls")]
    PollTimeout { attempts: u32 },

    #[error("Image generation was cancelled")]
    PollCancelled,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let status = rejection.status();
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Request body is too large".to_string()
        } else {
            format!("Invalid request body: {}", rejection.body_text())
        };
        AppError::InvalidBody { status, message }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidBody { status, .. } => *status,
            AppError::AuthConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::UpstreamUnauthorized { .. } => StatusCode::BAD_GATEWAY,
            AppError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::QuotaExceeded(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::JobFailed(_) => StatusCode::BAD_GATEWAY,
            AppError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            AppError::PollCancelled => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::UpstreamRateLimited { .. }
                | AppError::PollTimeout { .. }
                | AppError::StoreUnavailable(_)
        )
    }

    /// Message safe to show to the end user. Never includes upstream
    /// payloads or backend error text.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::InvalidBody { message, .. } => message.clone(),
            AppError::AuthConfiguration(_) => {
                "The story service is not configured. Please try again later.".to_string()
            }
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::UpstreamUnauthorized { .. }
            | AppError::Upstream { .. }
            | AppError::Transport(_)
            | AppError::MalformedResponse(_) => {
                "The story service is having trouble right now. Please try again.".to_string()
            }
            AppError::UpstreamRateLimited { .. } => {
                "Too many stories are being written right now. Please wait a moment and try again."
                    .to_string()
            }
            AppError::StoreUnavailable(_) => {
                "We couldn't check your story allowance. Please try again shortly.".to_string()
            }
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::QuotaExceeded(msg) => msg.clone(),
            AppError::JobFailed(_) => "We couldn't paint the cover this time.".to_string(),
            AppError::PollTimeout { .. } => "The cover took too long to paint.".to_string(),
            AppError::PollCancelled => "The cover request was cancelled.".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(_)
            | AppError::InvalidBody { .. }
            | AppError::Unauthorized(_)
            | AppError::NotFound(_)
            | AppError::QuotaExceeded(_) => tracing::debug!("Request rejected: {}", self),
            AppError::UpstreamRateLimited { .. } | AppError::PollCancelled => {
                tracing::warn!("{}", self)
            }
            _ => tracing::error!("{}", self),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();

        let status = self.status_code();
        let body = Json(json!({
            "error": self.user_message(),
            "status": status.as_u16(),
            "retryable": self.is_retryable(),
        }));

        if matches!(self, AppError::UpstreamRateLimited { .. }) {
            return (status, [(header::RETRY_AFTER, "30")], body).into_response();
        }

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
