use crate::models::Amount;
use serde::Deserialize;

/// Body of `POST /checkout`.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Number or decimal string; sent to PayPal with two decimals.
    pub amount: Amount,
    /// Opaque host data handed back to the completion hooks.
    pub local_data: Option<serde_json::Value>,
}

/// Query string PayPal appends to the return URL.
#[derive(Debug, Deserialize)]
pub struct CompleteParams {
    #[serde(rename = "PayerID")]
    pub payer_id: String,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
    pub token: Option<String>,
}
