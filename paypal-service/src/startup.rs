//! Application startup and lifecycle management.

use crate::config::{PayPalConfig, Settings, SignatureSettings};
use crate::handlers;
use crate::services::{
    init_metrics, CheckoutHooks, KeyValueCache, LocalStash, MemoryCache, PayPalClient,
    PaymentGateway, RedirectHooks, RedisCache,
};
use crate::{AppState, SigningCredentials};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::signature::{signature_validation_middleware, SignatureConfig};
use service_core::middleware::tracing::request_id_middleware;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{MemoryStore, SessionManagerLayer};

/// Routes reachable without a request signature. PayPal redirects the
/// buyer's browser to the callbacks, so those cannot be signed.
const UNSIGNED_PATHS: [&str; 4] = ["/health", "/ready", "/metrics", "/paypal-response/"];

/// Token, stash and nonce storage. Redis when configured, in-process otherwise.
pub fn build_cache(config: &Settings) -> Result<Arc<dyn KeyValueCache>, AppError> {
    match &config.cache.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.expose_secret().as_str()).map_err(|e| {
                tracing::error!("Failed to connect to Redis: {}", e);
                AppError::from(e)
            })?;
            tracing::info!("Using Redis cache for PayPal tokens and stash");
            Ok(Arc::new(RedisCache::new(client)))
        }
        None => {
            tracing::info!("Using in-process cache for PayPal tokens and stash");
            Ok(Arc::new(MemoryCache::new()))
        }
    }
}

/// Wire the gateway from settings. Fails fast on missing PayPal credentials.
pub fn build_gateway(
    config: &Settings,
    cache: Arc<dyn KeyValueCache>,
    hooks: Arc<dyn CheckoutHooks>,
) -> Result<PaymentGateway, AppError> {
    let paypal = PayPalConfig::try_from(&config.paypal).map_err(|e| {
        tracing::error!("Invalid PayPal configuration: {}", e);
        AppError::from(e)
    })?;

    let client = PayPalClient::new(paypal, cache.clone())?;
    let stash = LocalStash::new(
        cache.clone(),
        Duration::from_secs(config.checkout.stash_ttl_secs),
    );

    tracing::info!(
        endpoint = %client.config().endpoint,
        currency = %client.config().currency,
        "PayPal client initialized"
    );

    Ok(PaymentGateway::new(
        client,
        cache,
        stash,
        hooks,
        &config.server.public_url,
    ))
}

/// Signing credentials; both halves are mandatory while signatures are enforced.
pub fn signing_credentials(
    settings: &SignatureSettings,
) -> Result<Option<SigningCredentials>, AppError> {
    match (&settings.client_id, &settings.secret) {
        (Some(client_id), Some(secret)) => Ok(Some(SigningCredentials {
            client_id: client_id.clone(),
            secret: secret.clone(),
        })),
        _ if settings.enabled => {
            tracing::error!("Request signing is enabled but client ID or secret is missing");
            Err(AppError::ConfigError(anyhow::anyhow!(
                "Missing signature client ID/secret configuration"
            )))
        }
        _ => {
            tracing::warn!("Request signing is disabled; merchant routes are unauthenticated");
            Ok(None)
        }
    }
}

pub fn build_state(
    config: &Settings,
    hooks: Arc<dyn CheckoutHooks>,
) -> Result<AppState, AppError> {
    let signing = signing_credentials(&config.signature)?;
    let cache = build_cache(config)?;
    let gateway = build_gateway(config, cache.clone(), hooks)?;

    Ok(AppState {
        gateway: Arc::new(gateway),
        signature_config: SignatureConfig {
            require_signatures: config.signature.enabled,
            excluded_paths: UNSIGNED_PATHS.iter().map(|p| p.to_string()).collect(),
            max_clock_skew_secs: config.signature.max_clock_skew_secs,
        },
        signing,
        cache,
    })
}

pub fn build_router(state: AppState) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default()).with_secure(false);

    // Last layer runs first: the request id must exist before the trace span.
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/checkout", post(handlers::paypal::checkout))
        .route(
            "/paypal-response/complete",
            get(handlers::paypal::complete),
        )
        .route(
            "/paypal-response/complete/:trxid",
            get(handlers::paypal::complete_with_id),
        )
        .route("/paypal-response/cancel", get(handlers::paypal::cancel))
        .route(
            "/paypal-response/cancel/:trxid",
            get(handlers::paypal::cancel_with_id),
        )
        .route(
            "/paypal-response/return",
            get(handlers::paypal::unsolicited),
        )
        .route("/payments/:id/refund", post(handlers::paypal::refund))
        .layer(session_layer)
        .layer(from_fn_with_state(
            state.clone(),
            signature_validation_middleware::<AppState>,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build with the default redirect hooks from `checkout` settings.
    pub async fn build(config: Settings) -> Result<Self, AppError> {
        let hooks = Arc::new(RedirectHooks::new(
            config.checkout.success_url.clone(),
            config.checkout.cancel_url.clone(),
        ));
        Self::build_with_hooks(config, hooks).await
    }

    pub async fn build_with_hooks(
        config: Settings,
        hooks: Arc<dyn CheckoutHooks>,
    ) -> Result<Self, AppError> {
        init_metrics();
        let state = build_state(&config, hooks)?;

        let address = format!("{}:{}", config.server.host, config.server.port);
        let listener = TcpListener::bind(&address).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router: build_router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), AppError> {
        tracing::info!("Listening on port {}", self.port);
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }
}
