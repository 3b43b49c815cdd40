//! HMAC-SHA256 request signing shared by callers and the signature middleware.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign a request.
///
/// Payload: `method|path|timestamp|nonce|hex(sha256(body))`, keyed with `secret`.
pub fn generate_signature(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    let body_hash = hex::encode(Sha256::digest(body));
    let payload = format!("{}|{}|{}|{}|{}", method, path, timestamp, nonce, body_hash);

    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a signature in constant time.
pub fn verify_signature(
    secret: &str,
    method: &str,
    path: &str,
    timestamp: i64,
    nonce: &str,
    body: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected = generate_signature(secret, method, path, timestamp, nonce, body)?;

    if expected.len() != signature.len() {
        return Ok(false);
    }

    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "shop-signing-secret";
    const BODY: &[u8] = br#"{"amount":"19.90"}"#;

    fn sign(path: &str, body: &[u8]) -> String {
        generate_signature(SECRET, "POST", path, 1_700_000_000, "n-1", body).unwrap()
    }

    #[test]
    fn signature_verifies_against_same_request() {
        let signature = sign("/checkout", BODY);
        assert_eq!(signature.len(), 64);
        assert!(
            verify_signature(SECRET, "POST", "/checkout", 1_700_000_000, "n-1", BODY, &signature)
                .unwrap()
        );
    }

    #[test]
    fn signature_is_bound_to_path_and_body() {
        let signature = sign("/payments/PAY-1/refund", b"");

        assert!(!verify_signature(
            SECRET,
            "POST",
            "/payments/PAY-2/refund",
            1_700_000_000,
            "n-1",
            b"",
            &signature
        )
        .unwrap());
        assert!(!verify_signature(
            SECRET,
            "POST",
            "/payments/PAY-1/refund",
            1_700_000_000,
            "n-1",
            b"{}",
            &signature
        )
        .unwrap());
    }

    #[test]
    fn wrong_secret_or_truncated_signature_fails() {
        let signature = sign("/checkout", BODY);

        assert!(!verify_signature(
            "other-secret",
            "POST",
            "/checkout",
            1_700_000_000,
            "n-1",
            BODY,
            &signature
        )
        .unwrap());
        assert!(!verify_signature(
            SECRET,
            "POST",
            "/checkout",
            1_700_000_000,
            "n-1",
            BODY,
            &signature[1..]
        )
        .unwrap());
    }
}
