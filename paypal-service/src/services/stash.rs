//! Local-transaction stash.
//!
//! Host data for a checkout attempt is parked in the cache under a random key
//! before the browser leaves for PayPal. Only the key travels through PayPal's
//! redirect URLs, so no application state is exposed to the browser.

use crate::error::GatewayError;
use crate::services::cache::KeyValueCache;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

const KEY_PREFIX: &str = "paypal_local_trx:";

#[derive(Clone)]
pub struct LocalStash {
    cache: Arc<dyn KeyValueCache>,
    ttl: Duration,
}

impl LocalStash {
    pub fn new(cache: Arc<dyn KeyValueCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Park `data` and return its lookup key. `None` passes through.
    pub async fn store<T: Serialize>(&self, data: Option<&T>) -> Result<Option<String>, GatewayError> {
        let Some(data) = data else {
            return Ok(None);
        };

        let key = generate_key();
        let payload = serde_json::to_string(data)?;
        self.cache
            .set(&cache_key(&key), &payload, self.ttl)
            .await?;

        tracing::debug!(ttl_secs = self.ttl.as_secs(), "Stashed local transaction");
        Ok(Some(key))
    }

    /// Look up stashed data without removing it. `None` passes through; an
    /// unknown or expired key fails with `NotFound`.
    pub async fn retrieve<T: DeserializeOwned>(
        &self,
        key: Option<&str>,
    ) -> Result<Option<T>, GatewayError> {
        let Some(key) = key else {
            return Ok(None);
        };

        let payload = self.cache.get(&cache_key(key)).await?;
        decode(key, payload).map(Some)
    }

    /// Retrieve and remove in one step, so a key is honoured at most once.
    pub async fn consume<T: DeserializeOwned>(
        &self,
        key: Option<&str>,
    ) -> Result<Option<T>, GatewayError> {
        let Some(key) = key else {
            return Ok(None);
        };

        let payload = self.cache.take(&cache_key(key)).await?;
        decode(key, payload).map(Some)
    }

    /// Drop an entry once its flow has finished.
    pub async fn discard(&self, key: Option<&str>) -> Result<(), GatewayError> {
        match key {
            Some(key) => self.cache.delete(&cache_key(key)).await,
            None => Ok(()),
        }
    }
}

fn decode<T: DeserializeOwned>(key: &str, payload: Option<String>) -> Result<T, GatewayError> {
    let payload = payload.ok_or_else(|| {
        tracing::warn!(key = %key, "Local transaction missing or expired");
        GatewayError::NotFound(format!("Local transaction {} not found or expired", key))
    })?;
    Ok(serde_json::from_str(&payload)?)
}

fn cache_key(key: &str) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// 256 bits from the OS-seeded thread RNG, hex encoded.
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
