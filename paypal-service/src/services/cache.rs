//! Key/value cache used for the OAuth token and stashed local transactions.

use crate::error::GatewayError;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Upper bound on any entry lifetime, whatever the caller or PayPal asks for.
pub const MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub fn clamp_ttl(ttl: Duration) -> Duration {
    ttl.min(MAX_TTL)
}

#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), GatewayError>;

    /// Store only when no live entry exists. Returns whether the value was stored.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, GatewayError>;

    /// Read and remove in one step; concurrent takers see the value at most once.
    async fn take(&self, key: &str) -> Result<Option<String>, GatewayError>;

    async fn delete(&self, key: &str) -> Result<(), GatewayError>;

    /// Drop expired entries. Backends that expire on their own need not override.
    async fn garbage_collect(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: &str, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value: value.to_string(),
            expires_at: now.checked_add(clamp_ttl(ttl)).unwrap_or(now),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-process cache. Entries are dropped lazily on read or by `garbage_collect`.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, e| !e.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), GatewayError> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, GatewayError> {
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_live(Instant::now()) {
                    return Ok(false);
                }
                occupied.insert(CacheEntry::new(value, ttl));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, ttl));
            }
        }
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, GatewayError> {
        Ok(self
            .entries
            .remove(key)
            .filter(|(_, e)| e.is_live(Instant::now()))
            .map(|(_, e)| e.value))
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn garbage_collect(&self) -> Result<(), GatewayError> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        tracing::debug!(
            removed = before.saturating_sub(self.entries.len()),
            "Cache garbage collected"
        );
        Ok(())
    }
}

/// Redis-backed cache shared between service instances.
#[derive(Clone)]
pub struct RedisCache {
    client: redis::Client,
}

impl RedisCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, GatewayError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get redis connection: {}", e);
                GatewayError::from(e)
            })
    }
}

#[async_trait]
impl KeyValueCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut con = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), GatewayError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(px(ttl))
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, GatewayError> {
        let mut con = self.connection().await?;
        let stored: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(px(ttl))
            .query_async(&mut con)
            .await?;
        Ok(stored.is_some())
    }

    async fn take(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut con = self.connection().await?;
        let value: Option<String> = redis::cmd("GETDEL").arg(key).query_async(&mut con).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), GatewayError> {
        let mut con = self.connection().await?;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut con).await?;
        Ok(())
    }
}

/// `PX` milliseconds; redis rejects 0.
fn px(ttl: Duration) -> u64 {
    (clamp_ttl(ttl).as_millis() as u64).max(1)
}
