use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature-256";

/// Verify an HMAC-SHA256 request signature.
///
/// The caller sends the signature in the `X-Signature-256` header as `sha256=<hex>`.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: &str) -> Result<()> {
    let signature_hex = signature_header
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::WebhookVerification("Missing sha256= prefix".to_string()))?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| AppError::WebhookVerification(format!("Invalid hex in signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))?;

    mac.update(payload);

    mac.verify_slice(&signature_bytes)
        .map_err(|_| AppError::WebhookVerification("Signature mismatch".to_string()))
}

/// Header value for `payload`, as a caller would compute it.
pub fn sign(secret: &str, payload: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))?;
    mac.update(payload);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_signature() {
        let secret = "test-secret";
        let payload = br#"{"execution_id":"ex1"}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(payload);
        let expected_hex = hex::encode(mac.finalize().into_bytes());

        let header = format!("sha256={expected_hex}");
        assert!(verify_signature(secret, payload, &header).is_ok());
        assert_eq!(sign(secret, payload).unwrap(), header);
    }

    #[test]
    fn test_invalid_signature() {
        let header = "sha256=0000000000000000000000000000000000000000000000000000000000000000";
        assert!(verify_signature("test-secret", b"hello world", header).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign("other-secret", b"hello world").unwrap();
        assert!(verify_signature("test-secret", b"hello world", &header).is_err());
    }

    #[test]
    fn test_missing_prefix() {
        assert!(verify_signature("test-secret", b"hello world", "abcdef1234567890").is_err());
    }

    #[test]
    fn test_bad_hex() {
        assert!(matches!(
            verify_signature("test-secret", b"x", "sha256=zz"),
            Err(AppError::WebhookVerification(_))
        ));
    }
}
