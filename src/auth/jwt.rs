use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use crate::errors::{AppError, Result};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // Anonymous user ID
    pub exp: i64,
    pub iat: i64,
    pub provider: AuthProvider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Anonymous,
}

pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_duration: Duration,
}

impl JwtService {
    pub fn new(secret: &str, session_ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            session_duration: Duration::days(session_ttl_days.max(1)),
        }
    }

    pub fn issue_session(&self, user_id: &str) -> Result<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expires_at = now + self.session_duration;
        let claims = Claims {
            sub: user_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            provider: AuthProvider::Anonymous,
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to sign session token: {}", e)))?;

        Ok((token, expires_at))
    }

    pub fn verify_session(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized("Invalid or expired session".to_string()));
        }

        Ok(token_data.claims)
    }
}
