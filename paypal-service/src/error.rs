//! Gateway error taxonomy and its mapping onto HTTP responses.

use reqwest::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required setting is missing. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// PayPal answered with a non-2xx status.
    #[error("Error {status} in PayPal call to {url}")]
    Transport {
        status: StatusCode,
        url: String,
        body: String,
    },

    /// PayPal answered 2xx but the body carries an `error` code.
    #[error("PayPal: {description} [{code}] while calling {url}")]
    Processor {
        code: String,
        description: String,
        url: String,
    },

    /// The response lacks a structure the checkout flow depends on.
    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// A correlation id or session value has no matching entry.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Session error: {0}")]
    Session(String),
}

impl GatewayError {
    /// Transient failures worth retrying on idempotent calls.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Http(e) => e.is_timeout() || e.is_connect(),
            GatewayError::Transport { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}

impl From<redis::RedisError> for GatewayError {
    fn from(err: redis::RedisError) -> Self {
        GatewayError::Cache(err.to_string())
    }
}

impl From<tower_sessions::session::Error> for GatewayError {
    fn from(err: tower_sessions::session::Error) -> Self {
        GatewayError::Session(err.to_string())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            GatewayError::InvalidAmount(msg) => {
                AppError::BadRequest(anyhow::anyhow!("Invalid amount: {}", msg))
            }
            GatewayError::Configuration(msg) => AppError::ConfigError(anyhow::anyhow!(msg)),
            e @ (GatewayError::Transport { .. }
            | GatewayError::Processor { .. }
            | GatewayError::ProtocolMismatch(_)
            | GatewayError::Http(_)) => AppError::BadGateway(e.to_string()),
            e => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processor_error_message_names_code_description_and_url() {
        let err = GatewayError::Processor {
            code: "invalid_grant".to_string(),
            description: "bad creds".to_string(),
            url: "https://api.sandbox.paypal.com/v1/oauth2/token".to_string(),
        };

        assert_eq!(
            err.to_string(),
            "PayPal: bad creds [invalid_grant] while calling https://api.sandbox.paypal.com/v1/oauth2/token"
        );
    }

    #[test]
    fn only_server_side_transport_errors_are_retryable() {
        let transport = |status| GatewayError::Transport {
            status,
            url: "u".to_string(),
            body: String::new(),
        };

        assert!(transport(StatusCode::SERVICE_UNAVAILABLE).is_retryable());
        assert!(transport(StatusCode::TOO_MANY_REQUESTS).is_retryable());
        assert!(!transport(StatusCode::UNAUTHORIZED).is_retryable());
        assert!(!GatewayError::ProtocolMismatch("x".to_string()).is_retryable());
    }

    #[test]
    fn maps_onto_app_errors() {
        assert!(matches!(
            AppError::from(GatewayError::NotFound("gone".to_string())),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            AppError::from(GatewayError::ProtocolMismatch("Missing approval URL".to_string())),
            AppError::BadGateway(_)
        ));
        assert!(matches!(
            AppError::from(GatewayError::InvalidAmount("-1".to_string())),
            AppError::BadRequest(_)
        ));
        assert!(matches!(
            AppError::from(GatewayError::Cache("down".to_string())),
            AppError::InternalError(_)
        ));
    }
}
