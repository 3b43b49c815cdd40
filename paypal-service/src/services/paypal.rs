//! PayPal REST API client.
//!
//! Implements the OAuth2 client-credentials flow with a cached bearer token,
//! payment creation, payment execution and full refunds.

use crate::config::PayPalConfig;
use crate::error::GatewayError;
use crate::models::{
    AccessToken, Amount, CreatePaymentRequest, PaymentResponse, RefundResponse, RefundResult,
    TokenResponse,
};
use crate::services::cache::{clamp_ttl, KeyValueCache};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION};
use reqwest::{Client, Method, Request};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::sync::Arc;
use std::time::Duration;

/// Cache key of the shared OAuth token.
pub const CACHE_TOKEN: &str = "paypal_cached_token";

const API_VERSION: &str = "v1";

/// Body of an outbound request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    /// Flat key/value pairs, sent form-urlencoded.
    Form(Vec<(&'static str, String)>),
    Json(Value),
}

/// PayPal client for interacting with the PayPal REST API.
#[derive(Clone)]
pub struct PayPalClient {
    client: Client,
    config: PayPalConfig,
    cache: Arc<dyn KeyValueCache>,
    retry: RetryConfig,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig, cache: Arc<dyn KeyValueCache>) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            config,
            cache,
            retry: RetryConfig::quick(),
        })
    }

    /// Override the backoff used for token fetches and payment lookups.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &PayPalConfig {
        &self.config
    }

    /// Absolute URLs (e.g. links from a prior response) are used verbatim;
    /// anything else is resolved under `{endpoint}/v1/`.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!(
                "{}/{}/{}",
                self.config.endpoint,
                API_VERSION,
                path.trim_start_matches('/')
            )
        }
    }

    /// Build one outbound request.
    ///
    /// GET when `use_get` is set or there is no body, POST otherwise. Without
    /// a token the client credentials go out as Basic auth.
    pub fn gen_request(
        &self,
        path: &str,
        body: &RequestBody,
        token: Option<&AccessToken>,
        use_get: bool,
    ) -> Result<Request, GatewayError> {
        let url = self.url_for(path);
        let method = if use_get || matches!(body, RequestBody::Empty) {
            Method::GET
        } else {
            Method::POST
        };

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_LANGUAGE, "en_US");

        builder = match token {
            None => builder.basic_auth(
                &self.config.client_id,
                Some(self.config.client_secret.expose_secret()),
            ),
            Some(token) => builder.header(AUTHORIZATION, token.authorization()),
        };

        if method == Method::POST {
            builder = match body {
                RequestBody::Empty => builder,
                RequestBody::Form(fields) => builder.form(fields),
                RequestBody::Json(value) => {
                    tracing::debug!(url = %url, body = %value, "Sending PayPal message");
                    builder.json(value)
                }
            };
        }

        Ok(builder.build()?)
    }

    /// Execute a request and interpret the response.
    ///
    /// Non-2xx is a transport error; a 2xx body carrying `error` is a
    /// processor error. An empty 2xx body yields `Value::Null`.
    pub async fn call(&self, request: Request) -> Result<Value, GatewayError> {
        let url = request.url().to_string();
        let method = request.method().clone();

        let response = self.client.execute(request).await.map_err(|e| {
            tracing::error!(method = %method, url = %url, error = %e, "PayPal request failed");
            GatewayError::Http(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            method = %method,
            url = %url,
            status = %status,
            body_len = body.len(),
            "PayPal response"
        );

        if !status.is_success() {
            tracing::error!(status = %status, url = %url, body = %body, "Error in PayPal call");
            return Err(GatewayError::Transport { status, url, body });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| {
            GatewayError::ProtocolMismatch(format!("Malformed JSON from {}: {}", url, e))
        })?;

        if let Some(error) = value.get("error") {
            let code = match error {
                Value::String(code) => code.clone(),
                other => other.to_string(),
            };
            let description = value
                .get("error_description")
                .and_then(Value::as_str)
                .unwrap_or("no description")
                .to_string();

            tracing::error!(code = %code, description = %description, url = %url, "Error in PayPal call");
            return Err(GatewayError::Processor {
                code,
                description,
                url,
            });
        }

        Ok(value)
    }

    /// `call`, then decode into a typed response model.
    pub async fn call_as<T: DeserializeOwned>(&self, request: Request) -> Result<T, GatewayError> {
        let url = request.url().to_string();
        let value = self.call(request).await?;
        serde_json::from_value(value).map_err(|e| {
            GatewayError::ProtocolMismatch(format!("Unexpected response from {}: {}", url, e))
        })
    }

    /// Return a valid bearer token, fetching a new one only when the cached
    /// token is absent or expired.
    pub async fn authenticate(&self) -> Result<AccessToken, GatewayError> {
        let now = chrono::Utc::now().timestamp();

        if let Some(token) = self.cached_token().await? {
            if token.is_valid_at(now) {
                return Ok(token);
            }
            tracing::debug!(acquired_at = token.acquired_at, "Cached PayPal token expired");
        }

        let token = retry_with_backoff(
            &self.retry,
            "paypal_oauth_token",
            GatewayError::is_retryable,
            || self.fetch_token(),
        )
        .await?;

        let ttl = clamp_ttl(Duration::from_secs(token.expires_in.max(0) as u64));
        self.cache
            .set(CACHE_TOKEN, &serde_json::to_string(&token)?, ttl)
            .await?;

        tracing::info!(expires_in = token.expires_in, "PayPal access token acquired");
        Ok(token)
    }

    async fn cached_token(&self) -> Result<Option<AccessToken>, GatewayError> {
        let Some(raw) = self.cache.get(CACHE_TOKEN).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable cached PayPal token");
                Ok(None)
            }
        }
    }

    async fn fetch_token(&self) -> Result<AccessToken, GatewayError> {
        let body = RequestBody::Form(vec![("grant_type", "client_credentials".to_string())]);
        let request = self.gen_request("oauth2/token", &body, None, false)?;
        let response: TokenResponse = self.call_as(request).await?;
        Ok(AccessToken::from_response(
            response,
            chrono::Utc::now().timestamp(),
        ))
    }

    /// Create a `sale` payment. The caller must redirect the buyer to the
    /// returned `approval_url` link.
    pub async fn create_payment(
        &self,
        amount: &Amount,
        return_url: String,
        cancel_url: String,
    ) -> Result<PaymentResponse, GatewayError> {
        let token = self.authenticate().await?;
        let payment =
            CreatePaymentRequest::sale(amount, &self.config.currency, return_url, cancel_url);

        let request = self.gen_request(
            "payments/payment",
            &RequestBody::Json(serde_json::to_value(&payment)?),
            Some(&token),
            false,
        )?;
        let response: PaymentResponse = self.call_as(request).await?;

        tracing::info!(
            payment_id = %response.id,
            total = %amount,
            currency = %self.config.currency,
            "PayPal payment created"
        );
        Ok(response)
    }

    /// Execute an approved payment on behalf of `payer_id`. Never retried.
    pub async fn execute_payment(
        &self,
        payment_id: &str,
        payer_id: &str,
    ) -> Result<PaymentResponse, GatewayError> {
        let token = self.authenticate().await?;
        let request = self.gen_request(
            &format!("payments/payment/{}/execute/", payment_id),
            &RequestBody::Json(json!({ "payer_id": payer_id })),
            Some(&token),
            false,
        )?;
        let response: PaymentResponse = self.call_as(request).await?;

        tracing::info!(
            payment_id = %response.id,
            state = ?response.state,
            "PayPal payment executed"
        );
        Ok(response)
    }

    /// Fetch a payment resource. Idempotent, so transient failures are retried.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Value, GatewayError> {
        let token = self.authenticate().await?;
        let path = format!("payments/payment/{}", payment_id);
        let (path, token) = (&path, &token);

        retry_with_backoff(
            &self.retry,
            "paypal_get_payment",
            GatewayError::is_retryable,
            || async move {
                let request = self.gen_request(path, &RequestBody::Empty, Some(token), true)?;
                self.call(request).await
            },
        )
        .await
    }

    /// Fully refund the sale behind `payment_id`. Never retried.
    pub async fn refund_payment(&self, payment_id: &str) -> Result<RefundResult, GatewayError> {
        let payment = self.get_payment(payment_id).await?;
        let refund_url = refund_url(&payment)?;

        let token = self.authenticate().await?;
        let request =
            self.gen_request(&refund_url, &RequestBody::Json(json!({})), Some(&token), false)?;
        let response: RefundResponse = self.call_as(request).await?;

        tracing::info!(
            payment_id = %payment_id,
            refund_id = %response.id,
            state = ?response.state,
            "PayPal refund issued"
        );
        Ok(RefundResult { id: response.id })
    }
}

/// Locate the `refund` link under `transactions[].related_resources[].sale.links[]`.
///
/// Every level must have the expected shape; the error names the first one
/// that does not. Related resources other than sales are skipped.
pub fn refund_url(payment: &Value) -> Result<String, GatewayError> {
    let transactions = list_field(payment, "transactions")?;

    for transaction in transactions {
        for resource in list_field(transaction, "related_resources")? {
            let Some(sale) = resource.get("sale") else {
                continue;
            };
            if !sale.is_object() {
                return Err(GatewayError::ProtocolMismatch(
                    "Invalid 'sale' in payment resource".to_string(),
                ));
            }

            let refund = list_field(sale, "links")?
                .iter()
                .find(|link| link.get("rel").and_then(Value::as_str) == Some("refund"))
                .and_then(|link| link.get("href").and_then(Value::as_str));

            if let Some(href) = refund {
                return Ok(href.to_string());
            }
        }
    }

    Err(GatewayError::ProtocolMismatch(
        "Missing refund link".to_string(),
    ))
}

fn list_field<'a>(value: &'a Value, field: &str) -> Result<&'a Vec<Value>, GatewayError> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            GatewayError::ProtocolMismatch(format!(
                "Missing or invalid '{}' in payment resource",
                field
            ))
        })
}
