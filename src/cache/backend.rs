use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{error::CacheError, types::Itinerary};

/// Value persisted in the primary store for one fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub itinerary: Itinerary,
    pub created_at: DateTime<Utc>,
    pub ttl_secs: u64,
}

impl CacheEntry {
    pub fn new(itinerary: Itinerary, ttl: Duration) -> Self {
        Self {
            itinerary,
            created_at: Utc::now(),
            ttl_secs: ttl.as_secs().max(1),
        }
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.created_at);
        age.num_seconds() < self.ttl_secs as i64
    }
}

/// External key-value store used as the primary cache backend.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry`, expiring it after `entry.ttl_secs`.
    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry whose key contains `pattern`; returns how many went.
    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Remove every entry this backend owns.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// Redis implementation storing JSON-encoded entries with `SET EX`.
pub struct RedisBackend {
    client: redis::Client,
    key_prefix: String,
}

impl RedisBackend {
    /// Create a new Redis backend from a connection URL.
    pub fn new(connection_url: &str, key_prefix: impl Into<String>) -> Result<Self, CacheError> {
        let client = redis::Client::open(connection_url)?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn entry_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    /// `KEYS` glob selecting this backend's keys that contain `pattern` literally.
    fn matching_glob(&self, pattern: &str) -> String {
        let mut escaped = String::with_capacity(pattern.len());
        for ch in pattern.chars() {
            if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
                escaped.push('\\');
            }
            escaped.push(ch);
        }
        format!("{}:*{}*", self.key_prefix, escaped)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheError> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(self.entry_key(key)).await?;
        payload
            .map(|raw| serde_json::from_str(&raw).map_err(CacheError::from))
            .transpose()
    }

    async fn set(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let payload = serde_json::to_string(entry)?;
        conn.set_ex::<_, _, ()>(self.entry_key(key), payload, entry.ttl_secs)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.entry_key(key)).await?;
        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(self.matching_glob(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let removed: usize = conn.del(keys).await?;
        Ok(removed)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn.keys(format!("{}:*", self.key_prefix)).await?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys).await?;
        }
        Ok(())
    }
}
