//! Checkout saga: create a payment, send the buyer to PayPal, and settle the
//! callback when the browser returns.

use crate::error::GatewayError;
use crate::models::{Amount, PayerInfo, PaymentResult, RefundResult, SaleRecord};
use crate::services::cache::KeyValueCache;
use crate::services::paypal::PayPalClient;
use crate::services::session::SessionStore;
use crate::services::stash::LocalStash;
use async_trait::async_trait;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Session key holding the PayPal payment id between redirect legs.
pub const SESSION_PAYMENT_ID: &str = "paypal_payment_id";

/// Percentage of checkouts that sweep expired cache entries.
const GC_PROBABILITY: u32 = 5;

/// What the HTTP layer should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome<T> {
    Redirect(String),
    Result(T),
}

impl<T: Serialize> IntoResponse for GatewayOutcome<T> {
    fn into_response(self) -> Response {
        match self {
            GatewayOutcome::Redirect(url) => Redirect::to(&url).into_response(),
            GatewayOutcome::Result(value) => Json(value).into_response(),
        }
    }
}

/// Host callbacks invoked when a checkout settles. Each returns the URL the
/// browser should be sent to next.
#[async_trait]
pub trait CheckoutHooks: Send + Sync {
    async fn on_approved(
        &self,
        local_data: Option<Value>,
        payment_id: &str,
        payer_info: &PayerInfo,
        sales: &[SaleRecord],
    ) -> Result<String, GatewayError>;

    async fn on_cancelled(&self, local_data: Option<Value>) -> Result<String, GatewayError>;
}

/// Default hooks: log the outcome and redirect to fixed pages.
pub struct RedirectHooks {
    success_url: String,
    cancel_url: String,
}

impl RedirectHooks {
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            success_url: success_url.into(),
            cancel_url: cancel_url.into(),
        }
    }
}

#[async_trait]
impl CheckoutHooks for RedirectHooks {
    async fn on_approved(
        &self,
        local_data: Option<Value>,
        payment_id: &str,
        payer_info: &PayerInfo,
        sales: &[SaleRecord],
    ) -> Result<String, GatewayError> {
        let sale_ids: Vec<&str> = sales.iter().map(|s| s.id.as_str()).collect();
        tracing::info!(
            payment_id = %payment_id,
            payer_id = ?payer_info.payer_id,
            sale_ids = ?sale_ids,
            local_data = ?local_data,
            "Checkout approved"
        );

        let separator = if self.success_url.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}{}payment_id={}",
            self.success_url, separator, payment_id
        ))
    }

    async fn on_cancelled(&self, local_data: Option<Value>) -> Result<String, GatewayError> {
        tracing::info!(local_data = ?local_data, "Checkout cancelled");
        Ok(self.cancel_url.clone())
    }
}

pub struct PaymentGateway {
    client: PayPalClient,
    cache: Arc<dyn KeyValueCache>,
    stash: LocalStash,
    hooks: Arc<dyn CheckoutHooks>,
    public_url: String,
}

impl PaymentGateway {
    pub fn new(
        client: PayPalClient,
        cache: Arc<dyn KeyValueCache>,
        stash: LocalStash,
        hooks: Arc<dyn CheckoutHooks>,
        public_url: &str,
    ) -> Self {
        Self {
            client,
            cache,
            stash,
            hooks,
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Start a checkout and return the redirect to PayPal's approval page.
    pub async fn payment(
        &self,
        session: &dyn SessionStore,
        amount: Amount,
        local_data: Option<Value>,
    ) -> Result<GatewayOutcome<()>, GatewayError> {
        self.maybe_collect_garbage().await;

        let correlation_id = self.stash.store(local_data.as_ref()).await?;
        let return_url = self.callback_url("complete", correlation_id.as_deref());
        let cancel_url = self.callback_url("cancel", correlation_id.as_deref());

        let payment = self
            .client
            .create_payment(&amount, return_url, cancel_url)
            .await?;

        let approval_url = payment
            .approval_url()
            .ok_or_else(|| {
                tracing::error!(payment_id = %payment.id, "PayPal response lacks approval_url");
                GatewayError::ProtocolMismatch("Missing approval URL".to_string())
            })?
            .to_string();

        session.put(SESSION_PAYMENT_ID, &payment.id).await?;

        tracing::info!(
            payment_id = %payment.id,
            total = %amount,
            "Redirecting buyer to PayPal approval"
        );
        Ok(GatewayOutcome::Redirect(approval_url))
    }

    /// Settle an approved checkout after PayPal redirects the buyer back.
    ///
    /// `payment_id_hint` is the `paymentId` query parameter PayPal adds to the
    /// return URL; when present it must match the session.
    pub async fn complete(
        &self,
        session: &dyn SessionStore,
        correlation_id: Option<&str>,
        payer_id: &str,
        payment_id_hint: Option<&str>,
    ) -> Result<GatewayOutcome<PaymentResult>, GatewayError> {
        let payment_id = session.take(SESSION_PAYMENT_ID).await?.ok_or_else(|| {
            tracing::warn!("PayPal return without a pending payment in session");
            GatewayError::NotFound("No pending PayPal payment in session".to_string())
        })?;

        if let Some(hint) = payment_id_hint {
            if hint != payment_id {
                tracing::warn!(
                    session_payment_id = %payment_id,
                    returned_payment_id = %hint,
                    "PayPal return does not match session"
                );
                return Err(GatewayError::ProtocolMismatch(
                    "Returned payment id does not match session".to_string(),
                ));
            }
        }

        // Read only: the stash entry must outlive a failed execute.
        let local_data: Option<Value> = self.stash.retrieve(correlation_id).await?;

        let executed = match self.client.execute_payment(&payment_id, payer_id).await {
            Ok(executed) => executed,
            Err(e) => {
                tracing::error!(
                    payment_id = %payment_id,
                    correlation_id = ?correlation_id,
                    local_data = ?local_data,
                    error = %e,
                    "PayPal payment execution failed"
                );
                // Re-arm the session so the same return URL can be retried.
                if let Err(restore) = session.put(SESSION_PAYMENT_ID, &payment_id).await {
                    tracing::warn!(error = %restore, "Failed to restore pending payment in session");
                }
                return Err(e);
            }
        };
        let result = PaymentResult::from(executed);
        self.stash.discard(correlation_id).await?;

        let target = self
            .hooks
            .on_approved(local_data, &result.id, &result.payer_info, &result.sales)
            .await?;

        Ok(GatewayOutcome::Redirect(target))
    }

    /// Buyer backed out at PayPal. Nothing to tell PayPal; just clean up.
    pub async fn cancel(
        &self,
        session: &dyn SessionStore,
        correlation_id: Option<&str>,
    ) -> Result<GatewayOutcome<()>, GatewayError> {
        if let Some(payment_id) = session.take(SESSION_PAYMENT_ID).await? {
            tracing::info!(payment_id = %payment_id, "PayPal payment cancelled by buyer");
        }

        let local_data: Option<Value> = self.stash.consume(correlation_id).await?;
        let target = self.hooks.on_cancelled(local_data).await?;

        Ok(GatewayOutcome::Redirect(target))
    }

    /// Full refund of a previously executed payment.
    pub async fn refund_payment(
        &self,
        payment_id: &str,
    ) -> Result<GatewayOutcome<RefundResult>, GatewayError> {
        let refund = self.client.refund_payment(payment_id).await?;
        Ok(GatewayOutcome::Result(refund))
    }

    fn callback_url(&self, action: &str, correlation_id: Option<&str>) -> String {
        match correlation_id {
            Some(id) => format!("{}/paypal-response/{}/{}", self.public_url, action, id),
            None => format!("{}/paypal-response/{}", self.public_url, action),
        }
    }

    async fn maybe_collect_garbage(&self) {
        if rand::thread_rng().gen_range(0..100) >= GC_PROBABILITY {
            return;
        }
        if let Err(e) = self.cache.garbage_collect().await {
            tracing::warn!(error = %e, "Cache garbage collection failed");
        }
    }
}
