use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaBackend {
    Redis,
    Memory,
}

impl FromStr for QuotaBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(QuotaBackend::Redis),
            "memory" => Ok(QuotaBackend::Memory),
            other => bail!("Unsupported quota backend: {}", other),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Left unset the server still starts; story requests then fail with a
    /// configuration error.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    pub model_version: String,
    pub timeout_seconds: u64,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub max_reference_image_bytes: usize,
}

/// Room for the JSON envelope and the other fields around the image.
const BODY_LIMIT_HEADROOM_BYTES: usize = 64 * 1024;

impl ImageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Largest request body that can still carry a reference image of
    /// `max_reference_image_bytes` once base64 encoded.
    pub fn request_body_limit(&self) -> usize {
        let encoded = self.max_reference_image_bytes.div_ceil(3).saturating_mul(4);
        encoded.saturating_add(BODY_LIMIT_HEADROOM_BYTES)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub quota_backend: QuotaBackend,
    pub jwt_secret: String,
    pub session_ttl_days: i64,
    pub admin_token: Option<String>,
    pub max_concurrent_requests: usize,
    pub chat: ChatConfig,
    pub image: ImageConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup so tests don't
    /// have to mutate the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let secret = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Config {
            port: parse(&var("PORT", "3000"), "PORT")?,
            redis_url: var("REDIS_URL", "redis://localhost:6379"),
            quota_backend: var("QUOTA_BACKEND", "redis").parse()?,
            jwt_secret: var("JWT_SECRET", "change-me-in-production"),
            session_ttl_days: parse(&var("SESSION_TTL_DAYS", "30"), "SESSION_TTL_DAYS")?,
            admin_token: secret("ADMIN_TOKEN"),
            max_concurrent_requests: parse(
                &var("MAX_CONCURRENT_REQUESTS", "256"),
                "MAX_CONCURRENT_REQUESTS",
            )?,
            chat: ChatConfig {
                api_key: secret("OPENAI_API_KEY"),
                base_url: var("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                model: var("OPENAI_MODEL", "gpt-4o-mini"),
                temperature: parse(&var("OPENAI_TEMPERATURE", "0.8"), "OPENAI_TEMPERATURE")?,
                max_tokens: parse(&var("OPENAI_MAX_TOKENS", "1200"), "OPENAI_MAX_TOKENS")?,
                timeout_seconds: parse(&var("OPENAI_TIMEOUT_SECONDS", "60"), "OPENAI_TIMEOUT_SECONDS")?,
            },
            image: ImageConfig {
                api_token: secret("REPLICATE_API_TOKEN"),
                base_url: var("REPLICATE_BASE_URL", "https://api.replicate.com/v1"),
                model_version: var(
                    "REPLICATE_MODEL_VERSION",
                    "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b",
                ),
                timeout_seconds: parse(
                    &var("REPLICATE_TIMEOUT_SECONDS", "30"),
                    "REPLICATE_TIMEOUT_SECONDS",
                )?,
                poll_interval_ms: parse(&var("POLL_INTERVAL_MS", "2000"), "POLL_INTERVAL_MS")?,
                poll_max_attempts: parse(&var("POLL_MAX_ATTEMPTS", "30"), "POLL_MAX_ATTEMPTS")?,
                max_reference_image_bytes: parse(
                    &var("MAX_REFERENCE_IMAGE_BYTES", "5242880"), // 5MB
                    "MAX_REFERENCE_IMAGE_BYTES",
                )?,
            },
        })
    }
}

fn parse<T>(value: &str, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.quota_backend, QuotaBackend::Redis);
        assert_eq!(config.image.poll_interval_ms, 2000);
        assert_eq!(config.image.poll_max_attempts, 30);
        assert!(config.chat.api_key.is_none());
        assert!(config.image.api_token.is_none());
    }

    #[test]
    fn test_blank_secrets_are_treated_as_missing() {
        let config = Config::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "   "),
            ("REPLICATE_API_TOKEN", "r8_token"),
        ]))
        .unwrap();

        assert!(config.chat.api_key.is_none());
        assert_eq!(config.image.api_token.as_deref(), Some("r8_token"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("PORT", "not-a-port")])).is_err());
        assert!(Config::from_lookup(lookup(&[("QUOTA_BACKEND", "firestore")])).is_err());
    }

    #[test]
    fn test_body_limit_fits_encoded_reference_image() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        let encoded_max = config.image.max_reference_image_bytes.div_ceil(3) * 4;

        assert!(config.image.request_body_limit() > encoded_max);
        assert!(config.image.request_body_limit() > 2 * 1024 * 1024);
    }

    #[test]
    fn test_memory_backend() {
        let config = Config::from_lookup(lookup(&[("QUOTA_BACKEND", "Memory")])).unwrap();
        assert_eq!(config.quota_backend, QuotaBackend::Memory);
    }
}
