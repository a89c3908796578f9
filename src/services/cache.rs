//! Redis read-through cache for project reads and statistics.
//!
//! Values are stored as JSON with a TTL. Writes that change a project
//! invalidate every key mentioning it by pattern. Cache failures are logged
//! and treated as misses so the database stays the source of truth.

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Keys examined per `SCAN` round trip during pattern invalidation.
const SCAN_BATCH: usize = 500;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
}

impl RedisCache {
    pub async fn new(redis_url: &str, default_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        tracing::info!(ttl_secs = default_ttl_seconds, "Redis cache connected");

        Ok(Self {
            conn,
            default_ttl: Duration::from_secs(default_ttl_seconds),
        })
    }

    #[instrument(skip(self), fields(cache_hit))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();

        let hit = match conn.get::<_, Option<String>>(key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Redis get failed");
                None
            }
        };

        tracing::Span::current().record("cache_hit", hit.is_some());
        debug!(key, hit = hit.is_some(), "Cache lookup");
        hit
    }

    /// Store with the default TTL. Errors are logged, not returned.
    #[instrument(skip(self, value))]
    pub async fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = self.set_with_ttl(key, value, self.default_ttl).await {
            warn!(key, error = %e, "Failed to cache value");
        }
    }

    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        let mut conn = self.conn.clone();

        let data = serde_json::to_string(value).context("Failed to serialize value for cache")?;

        conn.set_ex::<_, _, ()>(key, data, ttl.as_secs())
            .await
            .context("Failed to set cache value")?;

        debug!(key, ttl_secs = ttl.as_secs(), "Cached value");
        Ok(())
    }

    /// Delete every key matching `pattern`, walking the full keyspace with
    /// `SCAN`. Errors are logged and stop the walk.
    #[instrument(skip(self))]
    pub async fn invalidate(&self, pattern: &str) -> usize {
        match self.delete_pattern(pattern).await {
            Ok(deleted) => deleted,
            Err(e) => {
                warn!(pattern, error = %e, "Cache invalidation failed");
                0
            }
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .context("Failed to scan cache keys")?;

            if !keys.is_empty() {
                let removed: usize = conn.del(&keys).await.context("Failed to delete cache keys")?;
                deleted += removed;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!(pattern, deleted, "Cache pattern delete");
        Ok(deleted)
    }

    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("Redis health check failed")?;
        Ok(())
    }
}

/// Cache key builders.
pub mod keys {
    use uuid::Uuid;

    pub fn project_detail(project_id: Uuid) -> String {
        format!("project:{}:detail", project_id)
    }

    /// Stats for one owner, or for every project when `owner_id` is `None`.
    pub fn project_stats(owner_id: Option<Uuid>) -> String {
        match owner_id {
            Some(id) => format!("stats:projects:owner:{}", id),
            None => "stats:projects:all".to_string(),
        }
    }

    pub fn bid_summary(project_id: Uuid) -> String {
        format!("bids:summary:project:{}", project_id)
    }

    /// Every key derived from one project.
    pub fn project_pattern(project_id: Uuid) -> String {
        format!("*project:{}*", project_id)
    }

    pub fn stats_pattern() -> &'static str {
        "stats:projects:*"
    }
}

#[cfg(test)]
mod tests {
    use super::keys;
    use uuid::Uuid;

    #[test]
    fn project_keys_match_invalidation_pattern() {
        let id = Uuid::new_v4();
        let pattern = keys::project_pattern(id);
        let prefix = pattern.trim_matches('*');

        assert!(keys::project_detail(id).contains(prefix));
        assert!(keys::bid_summary(id).contains(prefix));
        assert!(!keys::project_detail(Uuid::new_v4()).contains(prefix));
    }

    #[test]
    fn stats_keys_are_scoped() {
        let owner = Uuid::nil();
        assert_eq!(
            keys::project_stats(Some(owner)),
            format!("stats:projects:owner:{}", owner)
        );
        assert_eq!(keys::project_stats(None), "stats:projects:all");
        assert!(keys::stats_pattern().starts_with("stats:projects:"));
    }
}
