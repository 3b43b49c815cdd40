pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use service_core::error::AppError;
use service_core::middleware::signature::{SignatureConfig, SignatureStore};

use services::{KeyValueCache, PaymentGateway};

const NONCE_PREFIX: &str = "paypal_nonce:";

/// The merchant backend allowed to call the signed routes.
#[derive(Clone)]
pub struct SigningCredentials {
    pub client_id: String,
    pub secret: Secret<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<PaymentGateway>,
    pub signature_config: SignatureConfig,
    pub signing: Option<SigningCredentials>,
    /// Shared with the gateway; also remembers spent request nonces.
    pub cache: Arc<dyn KeyValueCache>,
}

impl AsRef<SignatureConfig> for AppState {
    fn as_ref(&self) -> &SignatureConfig {
        &self.signature_config
    }
}

#[async_trait]
impl SignatureStore for AppState {
    async fn validate_nonce(&self, nonce: &str) -> Result<bool, AppError> {
        // Outlives the accepted clock skew on both sides.
        let ttl = Duration::from_secs((self.signature_config.max_clock_skew_secs.max(1) * 2) as u64);
        let key = format!("{}{}", NONCE_PREFIX, nonce);

        self.cache
            .set_if_absent(&key, "1", ttl)
            .await
            .map_err(|e| {
                tracing::error!("Failed to record request nonce: {}", e);
                AppError::from(e)
            })
    }

    async fn get_signing_secret(&self, client_id: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .signing
            .as_ref()
            .filter(|c| c.client_id == client_id)
            .map(|c| c.secret.expose_secret().clone()))
    }
}
