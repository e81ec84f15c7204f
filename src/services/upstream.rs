use reqwest::{header::HeaderValue, Response, StatusCode};

use crate::errors::{AppError, Result};

const MAX_LOGGED_BODY_CHARS: usize = 500;

/// Builds the `Authorization` header for an upstream API, rejecting
/// missing or malformed credentials before any request is made.
pub fn bearer_header(service: &'static str, secret: Option<&str>) -> Result<HeaderValue> {
    let secret = secret.map(str::trim).filter(|s| !s.is_empty()).ok_or_else(|| {
        AppError::AuthConfiguration(format!("{} credentials are not configured", service))
    })?;

    if secret.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::AuthConfiguration(format!(
            "{} credentials are malformed",
            service
        )));
    }

    let mut value = HeaderValue::from_str(&format!("Bearer {}", secret)).map_err(|_| {
        AppError::AuthConfiguration(format!("{} credentials are malformed", service))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Maps non-2xx responses onto the caller-visible error kinds: 401 is an
/// auth failure, 429 is retryable, everything else is a generic failure.
pub async fn check_status(service: &'static str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_LOGGED_BODY_CHARS).collect();

    Err(match status {
        StatusCode::UNAUTHORIZED => {
            tracing::error!("{} rejected credentials: {}", service, body);
            AppError::UpstreamUnauthorized { service }
        }
        StatusCode::TOO_MANY_REQUESTS => AppError::UpstreamRateLimited { service },
        _ => AppError::Upstream {
            service,
            status: status.as_u16(),
            body,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_secret() {
        assert!(matches!(
            bearer_header("chat", None),
            Err(AppError::AuthConfiguration(_))
        ));
        assert!(matches!(
            bearer_header("chat", Some("  ")),
            Err(AppError::AuthConfiguration(_))
        ));
    }

    #[test]
    fn test_malformed_secret() {
        assert!(matches!(
            bearer_header("chat", Some("sk-abc def")),
            Err(AppError::AuthConfiguration(_))
        ));
    }

    #[test]
    fn test_valid_secret_is_sensitive() {
        let value = bearer_header("chat", Some("sk-test")).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer sk-test");
        assert!(value.is_sensitive());
    }
}
