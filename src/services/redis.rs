use redis::{aio::ConnectionManager, Client};
use crate::errors::Result;

#[derive(Clone)]
pub struct RedisService {
    connection_manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let connection_manager = ConnectionManager::new(client).await?;

        tracing::info!("Connected to Redis");
        Ok(Self { connection_manager })
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.connection_manager
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}
