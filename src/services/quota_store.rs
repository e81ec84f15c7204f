use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::{AsyncCommands, Script};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    config::{Config, QuotaBackend},
    errors::{AppError, Result},
    models::UserQuota,
    services::redis::RedisService,
};

const FIELD_CREATED_AT: &str = "createdAt";
const FIELD_MONTHLY_GENERATIONS: &str = "monthlyGenerations";
const FIELD_SHARE_COUNT: &str = "shareCount";

/// Persistent per-user usage counters.
///
/// Implementations must apply increments with the backend's own atomic
/// primitive so concurrent requests for one user never lose an update.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn get_usage_stats(&self, user_id: &str) -> Result<UserQuota>;

    async fn record_generation(&self, user_id: &str) -> Result<u32>;

    async fn record_share(&self, user_id: &str) -> Result<u32>;

    async fn reset_monthly_generations(&self, user_id: &str) -> Result<()>;

    /// Creates the record with zeroed counters if it does not exist yet.
    async fn ensure_user_document(&self, user_id: &str) -> Result<()>;

    async fn health_check(&self) -> Result<()>;
}

pub async fn create_quota_store(config: &Config) -> Result<Arc<dyn QuotaStore>> {
    match config.quota_backend {
        QuotaBackend::Redis => {
            let redis = RedisService::new(&config.redis_url).await?;
            Ok(Arc::new(RedisQuotaStore::new(redis)))
        }
        QuotaBackend::Memory => {
            tracing::warn!("Using in-memory quota store; counters are lost on restart");
            Ok(Arc::new(InMemoryQuotaStore::new()))
        }
    }
}

fn user_key(user_id: &str) -> String {
    format!("users/{}", user_id)
}

// Returns -1 when the user document is missing so increments never create
// half-initialised records.
const INCREMENT_SCRIPT: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return -1
    end
    return redis.call('HINCRBY', KEYS[1], ARGV[1], 1)
"#;

const RESET_SCRIPT: &str = r#"
    if redis.call('EXISTS', KEYS[1]) == 0 then
        return -1
    end
    redis.call('HSET', KEYS[1], ARGV[1], 0)
    return 0
"#;

pub struct RedisQuotaStore {
    redis: RedisService,
    increment_script: Script,
    reset_script: Script,
}

impl RedisQuotaStore {
    pub fn new(redis: RedisService) -> Self {
        Self {
            redis,
            increment_script: Script::new(INCREMENT_SCRIPT),
            reset_script: Script::new(RESET_SCRIPT),
        }
    }

    async fn increment(&self, user_id: &str, field: &str) -> Result<u32> {
        let key = user_key(user_id);
        let mut conn = self.redis.connection_manager().clone();

        let value: i64 = self
            .increment_script
            .key(&key)
            .arg(field)
            .invoke_async(&mut conn)
            .await?;

        if value < 0 {
            return Err(AppError::NotFound(format!("No usage record for user {}", user_id)));
        }

        u32::try_from(value)
            .map_err(|_| AppError::StoreUnavailable(format!("Counter {} out of range", field)))
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn get_usage_stats(&self, user_id: &str) -> Result<UserQuota> {
        let mut conn = self.redis.connection_manager().clone();
        let fields: HashMap<String, String> = conn.hgetall(user_key(user_id)).await?;

        if fields.is_empty() {
            return Err(AppError::NotFound(format!("No usage record for user {}", user_id)));
        }

        quota_from_fields(user_id, &fields)
    }

    async fn record_generation(&self, user_id: &str) -> Result<u32> {
        self.increment(user_id, FIELD_MONTHLY_GENERATIONS).await
    }

    async fn record_share(&self, user_id: &str) -> Result<u32> {
        self.increment(user_id, FIELD_SHARE_COUNT).await
    }

    async fn reset_monthly_generations(&self, user_id: &str) -> Result<()> {
        let mut conn = self.redis.connection_manager().clone();
        let result: i64 = self
            .reset_script
            .key(user_key(user_id))
            .arg(FIELD_MONTHLY_GENERATIONS)
            .invoke_async(&mut conn)
            .await?;

        if result < 0 {
            return Err(AppError::NotFound(format!("No usage record for user {}", user_id)));
        }
        Ok(())
    }

    async fn ensure_user_document(&self, user_id: &str) -> Result<()> {
        let key = user_key(user_id);
        let mut conn = self.redis.connection_manager().clone();

        redis::pipe()
            .atomic()
            .hset_nx(&key, FIELD_CREATED_AT, Utc::now().to_rfc3339())
            .ignore()
            .hset_nx(&key, FIELD_MONTHLY_GENERATIONS, 0)
            .ignore()
            .hset_nx(&key, FIELD_SHARE_COUNT, 0)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        self.redis.ping().await
    }
}

fn quota_from_fields(user_id: &str, fields: &HashMap<String, String>) -> Result<UserQuota> {
    let counter = |name: &str| -> Result<u32> {
        match fields.get(name) {
            Some(raw) => raw.parse().map_err(|_| {
                AppError::StoreUnavailable(format!("Corrupt {} for user {}: {:?}", name, user_id, raw))
            }),
            None => Ok(0),
        }
    };

    let created_at = fields
        .get(FIELD_CREATED_AT)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(UserQuota {
        user_id: user_id.to_string(),
        created_at,
        monthly_generations: counter(FIELD_MONTHLY_GENERATIONS)?,
        share_count: counter(FIELD_SHARE_COUNT)?,
    })
}

/// Process-local store for development and tests. The mutex is held only
/// for the duration of each single-record update.
#[derive(Default)]
pub struct InMemoryQuotaStore {
    users: Mutex<HashMap<String, UserQuota>>,
}

impl InMemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn update<F>(&self, user_id: &str, apply: F) -> Result<u32>
    where
        F: FnOnce(&mut UserQuota) -> u32 + Send,
    {
        let mut users = self.users.lock().await;
        let quota = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("No usage record for user {}", user_id)))?;
        Ok(apply(quota))
    }
}

#[async_trait]
impl QuotaStore for InMemoryQuotaStore {
    async fn get_usage_stats(&self, user_id: &str) -> Result<UserQuota> {
        self.users
            .lock()
            .await
            .get(user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("No usage record for user {}", user_id)))
    }

    async fn record_generation(&self, user_id: &str) -> Result<u32> {
        self.update(user_id, |quota| {
            quota.monthly_generations += 1;
            quota.monthly_generations
        })
        .await
    }

    async fn record_share(&self, user_id: &str) -> Result<u32> {
        self.update(user_id, |quota| {
            quota.share_count += 1;
            quota.share_count
        })
        .await
    }

    async fn reset_monthly_generations(&self, user_id: &str) -> Result<()> {
        self.update(user_id, |quota| {
            quota.monthly_generations = 0;
            0
        })
        .await?;
        Ok(())
    }

    async fn ensure_user_document(&self, user_id: &str) -> Result<()> {
        self.users
            .lock()
            .await
            .entry(user_id.to_string())
            .or_insert_with(|| UserQuota::new(user_id));
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let store = InMemoryQuotaStore::new();

        assert!(matches!(
            store.get_usage_stats("ghost").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.record_generation("ghost").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_is_idempotent() {
        let store = InMemoryQuotaStore::new();

        store.ensure_user_document("u1").await.unwrap();
        store.record_generation("u1").await.unwrap();
        store.record_share("u1").await.unwrap();
        store.ensure_user_document("u1").await.unwrap();

        let quota = store.get_usage_stats("u1").await.unwrap();
        assert_eq!(quota.monthly_generations, 1);
        assert_eq!(quota.share_count, 1);
    }

    #[tokio::test]
    async fn test_reset_only_touches_generations() {
        let store = InMemoryQuotaStore::new();
        store.ensure_user_document("u1").await.unwrap();
        for _ in 0..4 {
            store.record_generation("u1").await.unwrap();
        }
        store.record_share("u1").await.unwrap();

        store.reset_monthly_generations("u1").await.unwrap();

        let quota = store.get_usage_stats("u1").await.unwrap();
        assert_eq!(quota.monthly_generations, 0);
        assert_eq!(quota.share_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryQuotaStore::new());
        store.ensure_user_document("u1").await.unwrap();

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.record_generation("u1").await })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let quota = store.get_usage_stats("u1").await.unwrap();
        assert_eq!(quota.monthly_generations, 50);
    }

    #[test]
    fn test_quota_from_fields() {
        let mut fields = HashMap::new();
        fields.insert(FIELD_CREATED_AT.to_string(), "2024-05-01T10:00:00+00:00".to_string());
        fields.insert(FIELD_MONTHLY_GENERATIONS.to_string(), "4".to_string());

        let quota = quota_from_fields("u1", &fields).unwrap();
        assert_eq!(quota.monthly_generations, 4);
        assert_eq!(quota.share_count, 0);
        assert!(quota.created_at.is_some());

        fields.insert(FIELD_SHARE_COUNT.to_string(), "lots".to_string());
        assert!(matches!(
            quota_from_fields("u1", &fields),
            Err(AppError::StoreUnavailable(_))
        ));
    }
}
