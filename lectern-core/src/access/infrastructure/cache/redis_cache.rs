use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::domain::repositories::DeviceCache;

#[derive(Debug, Clone, Copy)]
pub struct DeviceCacheKeys;

impl DeviceCacheKeys {
    pub fn active_count(account_id: Uuid) -> String {
        format!("lectern:devices:active:{account_id}")
    }
}

/// Redis-backed count cache shared across server instances.
#[derive(Clone)]
pub struct RedisDeviceCache {
    conn: ConnectionManager,
    ttl: Duration,
}

impl fmt::Debug for RedisDeviceCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisDeviceCache")
            .field("connection", &"ConnectionManager")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl RedisDeviceCache {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self> {
        info!("Connecting to Redis device cache at {}", redis_url);

        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        info!("Connected to Redis device cache");
        Ok(Self { conn, ttl })
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait]
impl DeviceCache for RedisDeviceCache {
    async fn get(&self, account_id: Uuid) -> Result<Option<u64>> {
        let key = DeviceCacheKeys::active_count(account_id);
        let mut conn = self.conn.clone();
        let value: Option<u64> = conn.get(&key).await.context("Redis GET failed")?;
        debug!(key = %key, hit = value.is_some(), "device cache GET");
        Ok(value)
    }

    async fn set(&self, account_id: Uuid, active: u64) -> Result<()> {
        let key = DeviceCacheKeys::active_count(account_id);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(&key, active, self.ttl_secs())
            .await
            .context("Redis SETEX failed")?;
        debug!(key = %key, active, "device cache SET");
        Ok(())
    }

    async fn invalidate(&self, account_id: Uuid) -> Result<()> {
        let key = DeviceCacheKeys::active_count(account_id);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(&key).await.context("Redis DEL failed")?;
        debug!(key = %key, "device cache DEL");
        Ok(())
    }
}
