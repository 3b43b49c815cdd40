//! PayPal REST resources and the local results derived from them.

mod amount;

pub use amount::Amount;

use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth2 token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    pub scope: Option<String>,
    pub app_id: Option<String>,
}

/// A bearer token as kept in the cache.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessToken {
    pub token_type: String,
    pub access_token: String,
    pub expires_in: i64,
    /// Unix epoch seconds when the token was fetched.
    pub acquired_at: i64,
}

impl AccessToken {
    pub fn from_response(response: TokenResponse, acquired_at: i64) -> Self {
        Self {
            token_type: response.token_type,
            access_token: response.access_token,
            expires_in: response.expires_in,
            acquired_at,
        }
    }

    pub fn is_valid_at(&self, now: i64) -> bool {
        self.acquired_at.saturating_add(self.expires_in) > now
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token_type", &self.token_type)
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("acquired_at", &self.acquired_at)
            .finish()
    }
}

/// HATEOAS link attached to PayPal resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Link {
    pub href: String,
    pub rel: String,
    pub method: Option<String>,
}

/// Request body for `POST payments/payment`.
#[derive(Debug, Serialize)]
pub struct CreatePaymentRequest {
    pub intent: String,
    pub redirect_urls: RedirectUrls,
    pub payer: PayerMethod,
    pub transactions: Vec<TransactionAmount>,
}

#[derive(Debug, Serialize)]
pub struct RedirectUrls {
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Serialize)]
pub struct PayerMethod {
    pub payment_method: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionAmount {
    pub amount: MoneyAmount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoneyAmount {
    pub total: String,
    pub currency: String,
}

impl CreatePaymentRequest {
    pub fn sale(amount: &Amount, currency: &str, return_url: String, cancel_url: String) -> Self {
        Self {
            intent: "sale".to_string(),
            redirect_urls: RedirectUrls {
                return_url,
                cancel_url,
            },
            payer: PayerMethod {
                payment_method: "paypal".to_string(),
            },
            transactions: vec![TransactionAmount {
                amount: MoneyAmount {
                    total: amount.to_total(),
                    currency: currency.to_string(),
                },
            }],
        }
    }
}

/// Payment resource returned by create, execute and lookup calls.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub state: Option<String>,
    pub intent: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
    pub payer: Option<Payer>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl PaymentResponse {
    pub fn link(&self, rel: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.rel == rel)
    }

    pub fn approval_url(&self) -> Option<&str> {
        self.link("approval_url").map(|link| link.href.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payer {
    pub payment_method: Option<String>,
    pub status: Option<String>,
    pub payer_info: Option<PayerInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PayerInfo {
    pub payer_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub country_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Transaction {
    pub amount: Option<MoneyAmount>,
    #[serde(default)]
    pub related_resources: Vec<RelatedResource>,
}

/// One entry of `related_resources`: an object keyed by resource kind.
/// Only sales matter here; authorizations, captures and refunds are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RelatedResource {
    pub sale: Option<SaleRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleRecord {
    pub id: String,
    pub state: Option<String>,
    pub amount: Option<MoneyAmount>,
    pub parent_payment: Option<String>,
    pub create_time: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Flatten every sale under `transactions[].related_resources[]`, in order.
pub fn extract_sales(transactions: &[Transaction]) -> Vec<SaleRecord> {
    transactions
        .iter()
        .flat_map(|t| t.related_resources.iter())
        .filter_map(|r| r.sale.clone())
        .collect()
}

/// Outcome of an executed payment.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentResult {
    pub id: String,
    pub state: Option<String>,
    pub payer_info: PayerInfo,
    pub sales: Vec<SaleRecord>,
}

impl From<PaymentResponse> for PaymentResult {
    fn from(response: PaymentResponse) -> Self {
        let sales = extract_sales(&response.transactions);
        Self {
            id: response.id,
            state: response.state,
            payer_info: response
                .payer
                .and_then(|p| p.payer_info)
                .unwrap_or_default(),
            sales,
        }
    }
}

/// Refund endpoint response.
#[derive(Debug, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RefundResult {
    pub id: String,
}
