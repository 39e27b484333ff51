//! Redis-backed status cache.
//!
//! Holds the last computed `{status, graph}` pair per job id under a short
//! TTL so status polls avoid re-reading the durable record and artifact.
//! Every failure degrades to a cache miss; the cache never fails a lookup.
//!
//! ## Configuration
//!
//! - `REDIS_ENABLED`: set to "false" to disable caching (default: true)
//! - `REDIS_URL`: connection URL (default: redis://localhost:6379)
//! - `ANNOQ_CACHE_TTL`: entry TTL in seconds (default: 3600)

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use annoq_core::models::CachedStatus;
use annoq_core::{defaults, StatusCache};

pub struct RedisStatusCache {
    /// None when disabled or unreachable.
    connection: RwLock<Option<ConnectionManager>>,
    ttl_seconds: u64,
    prefix: String,
}

impl RedisStatusCache {
    /// Create a cache from environment configuration. Connection failures
    /// disable the cache rather than failing startup.
    pub async fn from_env() -> Self {
        let enabled = std::env::var("REDIS_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let ttl_seconds: u64 = std::env::var("ANNOQ_CACHE_TTL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults::CACHE_TTL_SECS);

        let connection = if enabled {
            match redis::Client::open(redis_url.as_str()) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("Redis status cache enabled (TTL: {}s)", ttl_seconds);
                        Some(conn)
                    }
                    Err(e) => {
                        warn!("Failed to connect to Redis, status cache disabled: {}", e);
                        None
                    }
                },
                Err(e) => {
                    warn!("Invalid Redis URL, status cache disabled: {}", e);
                    None
                }
            }
        } else {
            info!("Redis status cache disabled via REDIS_ENABLED=false");
            None
        };

        Self {
            connection: RwLock::new(connection),
            ttl_seconds,
            prefix: "annoq:job:".to_string(),
        }
    }

    /// A cache that never hits, for tests and Redis-less deployments.
    pub fn disabled() -> Self {
        Self {
            connection: RwLock::new(None),
            ttl_seconds: defaults::CACHE_TTL_SECS,
            prefix: "annoq:job:".to_string(),
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.is_some()
    }

    fn key(&self, id: Uuid) -> String {
        format!("{}{}", self.prefix, id)
    }
}

#[async_trait]
impl StatusCache for RedisStatusCache {
    async fn get(&self, id: Uuid) -> Option<CachedStatus> {
        let key = self.key(id);
        let mut guard = self.connection.write().await;
        let conn = guard.as_mut()?;

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(entry) => {
                    debug!("Cache HIT: {}", key);
                    Some(entry)
                }
                Err(e) => {
                    warn!("Cache deserialization error: {}", e);
                    None
                }
            },
            Ok(None) => {
                debug!("Cache MISS: {}", key);
                None
            }
            Err(e) => {
                error!("Redis GET error: {}", e);
                None
            }
        }
    }

    async fn put(&self, id: Uuid, entry: CachedStatus) {
        let key = self.key(id);
        let mut guard = self.connection.write().await;
        let Some(conn) = guard.as_mut() else {
            return;
        };

        let serialized = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                error!("Cache serialization error: {}", e);
                return;
            }
        };

        match conn
            .set_ex::<_, _, ()>(&key, serialized, self.ttl_seconds)
            .await
        {
            Ok(()) => debug!("Cache SET: {} (TTL: {}s)", key, self.ttl_seconds),
            Err(e) => error!("Redis SET error: {}", e),
        }
    }

    async fn invalidate(&self, id: Uuid) {
        let key = self.key(id);
        let mut guard = self.connection.write().await;
        let Some(conn) = guard.as_mut() else {
            return;
        };

        match conn.del::<_, ()>(&key).await {
            Ok(()) => debug!("Cache INVALIDATE: {}", key),
            Err(e) => error!("Redis DEL error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annoq_core::models::JobStatus;

    #[tokio::test]
    async fn test_disabled_cache_degrades_to_miss() {
        let cache = RedisStatusCache::disabled();
        let id = Uuid::new_v4();
        assert!(!cache.is_connected().await);

        cache
            .put(
                id,
                CachedStatus {
                    status: JobStatus::Complete,
                    graph: None,
                },
            )
            .await;
        assert!(cache.get(id).await.is_none());
        cache.invalidate(id).await;
    }

    #[test]
    fn test_key_includes_job_id() {
        let cache = RedisStatusCache::disabled();
        let id = Uuid::new_v4();
        let key = cache.key(id);
        assert!(key.starts_with("annoq:job:"));
        assert!(key.ends_with(&id.to_string()));
    }
}
