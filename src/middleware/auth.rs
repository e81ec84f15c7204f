use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};

use crate::{
    auth::JwtService,
    errors::AppError,
    handlers::AppState,
};

/// A caller holding a valid anonymous session token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// A caller presenting the configured admin token.
#[derive(Debug, Clone, Copy)]
pub struct AdminAccess;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

        let jwt_service = JwtService::new(&state.config.jwt_secret, state.config.session_ttl_days);
        let claims = jwt_service.verify_session(token)?;

        Ok(AuthenticatedUser { user_id: claims.sub })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // No configured token disables the admin routes entirely.
        let expected = state
            .config
            .admin_token
            .as_deref()
            .ok_or_else(|| AppError::Unauthorized("Admin access is disabled".to_string()))?;

        match bearer_token(&parts.headers) {
            Some(token) if token == expected => Ok(AdminAccess),
            _ => Err(AppError::Unauthorized("Invalid admin token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
