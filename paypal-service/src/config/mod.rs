use crate::error::GatewayError;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use service_core::error::AppError;
use std::time::Duration;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub paypal: PayPalSettings,
    #[serde(default)]
    pub checkout: CheckoutSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub signature: SignatureSettings,
    #[serde(default)]
    pub observability: ObservabilitySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Browser-reachable base URL used to build PayPal callback URLs.
    pub public_url: String,
}

/// Raw PayPal settings as read from file/env. Validated into [`PayPalConfig`].
#[derive(Deserialize, Clone, Debug, Default)]
pub struct PayPalSettings {
    pub endpoint: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<Secret<String>>,
    pub currency: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Clone, Debug)]
pub struct CheckoutSettings {
    /// Where the browser goes after an approved payment.
    #[serde(default = "default_success_url")]
    pub success_url: String,
    /// Where the browser goes after the buyer cancels at PayPal.
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,
    #[serde(default = "default_stash_ttl_secs")]
    pub stash_ttl_secs: u64,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            stash_ttl_secs: default_stash_ttl_secs(),
        }
    }
}

fn default_success_url() -> String {
    "/checkout/success".to_string()
}

fn default_cancel_url() -> String {
    "/checkout/cancelled".to_string()
}

fn default_stash_ttl_secs() -> u64 {
    3600
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct CacheSettings {
    /// Shared cache for tokens and stashed transactions. In-process when unset.
    pub redis_url: Option<Secret<String>>,
}

/// HMAC request signing for the merchant-facing routes.
#[derive(Deserialize, Clone, Debug)]
pub struct SignatureSettings {
    #[serde(default = "default_signature_enabled")]
    pub enabled: bool,
    pub client_id: Option<String>,
    pub secret: Option<Secret<String>>,
    #[serde(default = "default_max_clock_skew_secs")]
    pub max_clock_skew_secs: i64,
}

impl Default for SignatureSettings {
    fn default() -> Self {
        Self {
            enabled: default_signature_enabled(),
            client_id: None,
            secret: None,
            max_clock_skew_secs: default_max_clock_skew_secs(),
        }
    }
}

fn default_signature_enabled() -> bool {
    true
}

fn default_max_clock_skew_secs() -> i64 {
    60
}

#[derive(Deserialize, Clone, Debug)]
pub struct ObservabilitySettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilitySettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            otlp_endpoint: None,
        }
    }
}

fn default_log_level() -> String {
    "info,paypal_service=debug".to_string()
}

/// Validated PayPal REST credentials. Immutable once built.
#[derive(Clone, Debug)]
pub struct PayPalConfig {
    pub endpoint: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub currency: String,
    pub request_timeout: Duration,
}

impl PayPalConfig {
    pub const DEFAULT_CURRENCY: &'static str = "USD";
}

impl TryFrom<&PayPalSettings> for PayPalConfig {
    type Error = GatewayError;

    fn try_from(settings: &PayPalSettings) -> Result<Self, Self::Error> {
        let endpoint = non_empty(settings.endpoint.as_deref())
            .ok_or_else(|| missing("endpoint"))?
            .trim_end_matches('/')
            .to_string();

        let client_id = non_empty(settings.client_id.as_deref())
            .ok_or_else(|| missing("client ID"))?
            .to_string();

        let client_secret = settings
            .client_secret
            .as_ref()
            .filter(|s| !s.expose_secret().trim().is_empty())
            .cloned()
            .ok_or_else(|| missing("client secret"))?;

        let currency = non_empty(settings.currency.as_deref())
            .unwrap_or(Self::DEFAULT_CURRENCY)
            .to_string();

        if settings.request_timeout_secs == 0 {
            return Err(GatewayError::Configuration(
                "PayPal request timeout must be at least one second".to_string(),
            ));
        }

        Ok(Self {
            endpoint,
            client_id,
            client_secret,
            currency,
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn missing(what: &str) -> GatewayError {
    GatewayError::Configuration(format!("Missing PayPal {} configuration", what))
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let dir = service_core::config::config_dir("paypal-service")?;
    service_core::config::load(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> PayPalSettings {
        PayPalSettings {
            endpoint: Some("https://api.sandbox.paypal.com/".to_string()),
            client_id: Some("client-id".to_string()),
            client_secret: Some(Secret::new("client-secret".to_string())),
            currency: None,
            request_timeout_secs: 30,
        }
    }

    #[test]
    fn currency_defaults_to_usd() {
        let config = PayPalConfig::try_from(&settings()).unwrap();
        assert_eq!(config.currency, "USD");
        assert_eq!(config.endpoint, "https://api.sandbox.paypal.com");
    }

    #[test]
    fn missing_endpoint_fails_fast() {
        let mut s = settings();
        s.endpoint = None;
        let err = PayPalConfig::try_from(&s).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("endpoint")));
    }

    #[test]
    fn blank_client_id_fails_fast() {
        let mut s = settings();
        s.client_id = Some("  ".to_string());
        let err = PayPalConfig::try_from(&s).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("client ID")));
    }

    #[test]
    fn missing_secret_fails_fast() {
        let mut s = settings();
        s.client_secret = None;
        let err = PayPalConfig::try_from(&s).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("client secret")));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let mut s = settings();
        s.request_timeout_secs = 0;
        let err = PayPalConfig::try_from(&s).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("timeout")));
    }
}
