use crate::error::AppError;
use crate::utils::signature::verify_signature;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;

pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const NONCE_HEADER: &str = "x-nonce";
pub const SIGNATURE_HEADER: &str = "x-signature";

#[derive(Clone, Debug)]
pub struct SignatureConfig {
    /// When false, unsigned requests pass; signed ones are still verified.
    pub require_signatures: bool,
    /// Path prefixes that skip verification entirely.
    pub excluded_paths: Vec<String>,
    pub max_clock_skew_secs: i64,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            require_signatures: true,
            excluded_paths: Vec::new(),
            max_clock_skew_secs: 60,
        }
    }
}

/// Backing store for replay protection and client secrets.
#[async_trait]
pub trait SignatureStore: Send + Sync {
    /// Record `nonce`; false if it was already seen.
    async fn validate_nonce(&self, nonce: &str) -> Result<bool, AppError>;
    async fn get_signing_secret(&self, client_id: &str) -> Result<Option<String>, AppError>;
}

struct SignedHeaders {
    client_id: String,
    timestamp: String,
    nonce: String,
    signature: String,
}

pub async fn signature_validation_middleware<S>(
    State(state): State<S>,
    req: Request,
    next: Next,
) -> Result<Response, AppError>
where
    S: AsRef<SignatureConfig> + SignatureStore + Clone + Send + Sync + 'static,
{
    let config = state.as_ref();
    let path = req.uri().path();

    if config.excluded_paths.iter().any(|p| path.starts_with(p.as_str())) {
        return Ok(next.run(req).await);
    }

    if !config.require_signatures && !req.headers().contains_key(SIGNATURE_HEADER) {
        return Ok(next.run(req).await);
    }

    let signed = extract_signed_headers(req.headers())?;

    let timestamp: i64 = signed
        .timestamp
        .parse()
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid timestamp format")))?;

    let now = chrono::Utc::now().timestamp();
    if (now - timestamp).abs() > config.max_clock_skew_secs {
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Request timestamp expired"
        )));
    }

    let secret = state
        .get_signing_secret(&signed.client_id)
        .await?
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Invalid Client ID")))?;

    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to read body: {}", e)))?
        .to_bytes();

    let is_valid = verify_signature(
        &secret,
        parts.method.as_str(),
        parts.uri.path(),
        timestamp,
        &signed.nonce,
        &bytes,
        &signed.signature,
    )
    .map_err(|e| AppError::InternalError(anyhow::anyhow!("Signature verification error: {}", e)))?;

    if !is_valid {
        tracing::warn!(client_id = %signed.client_id, path = %parts.uri.path(), "Rejected request signature");
        return Err(AppError::AuthError(anyhow::anyhow!("Invalid signature")));
    }

    // Nonces are recorded for verified requests only.
    if !state.validate_nonce(&signed.nonce).await? {
        return Err(AppError::AuthError(anyhow::anyhow!(
            "Replay detected (nonce used)"
        )));
    }

    let req = Request::from_parts(parts, Body::from(bytes));
    Ok(next.run(req).await)
}

fn extract_signed_headers(headers: &HeaderMap) -> Result<SignedHeaders, AppError> {
    Ok(SignedHeaders {
        client_id: get_header(headers, CLIENT_ID_HEADER)?,
        timestamp: get_header(headers, TIMESTAMP_HEADER)?,
        nonce: get_header(headers, NONCE_HEADER)?,
        signature: get_header(headers, SIGNATURE_HEADER)?,
    })
}

fn get_header(headers: &HeaderMap, key: &str) -> Result<String, AppError> {
    headers
        .get(key)
        .ok_or_else(|| AppError::AuthError(anyhow::anyhow!("Missing header: {}", key)))?
        .to_str()
        .map(|s| s.to_string())
        .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid header format: {}", key)))
}
