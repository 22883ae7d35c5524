// ABOUTME: HMAC-SHA256 verification of inbound webhook payloads.
// ABOUTME: Strips a leading UTF-8 BOM before signing; compares signatures in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// UTF-8 byte-order mark some senders prepend to their payloads.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Remove a single leading BOM, if present. The digest must cover the
/// sender's logical payload, not the BOM it accidentally shipped.
pub fn strip_bom(data: &[u8]) -> &[u8] {
    data.strip_prefix(BOM).unwrap_or(data)
}

/// Sign a payload with HMAC-SHA256 and return the hex-encoded signature.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verifies the `X-Signature` header against the raw request body.
///
/// The secret is read once at startup and never logged.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// A missing header is a verification failure, not an error.
    pub fn verify(&self, payload: &[u8], signature: Option<&str>) -> bool {
        let Some(signature) = signature else {
            return false;
        };
        let expected = sign_payload(&self.secret, strip_bom(payload));
        // Constant-time comparison
        expected.len() == signature.len()
            && expected
                .as_bytes()
                .iter()
                .zip(signature.as_bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let verifier = SignatureVerifier::new("test_secret_12345");
        let payload = b"hello world";
        let sig = sign_payload("test_secret_12345", payload);
        assert!(verifier.verify(payload, Some(&sig)));
        assert!(!SignatureVerifier::new("wrong_secret").verify(payload, Some(&sig)));
        assert!(!verifier.verify(b"wrong payload", Some(&sig)));
    }

    #[test]
    fn missing_header_fails_verification() {
        let verifier = SignatureVerifier::new("secret");
        assert!(!verifier.verify(b"{}", None));
    }

    #[test]
    fn bom_is_stripped_before_signing() {
        let verifier = SignatureVerifier::new("secret");
        let sig = sign_payload("secret", b"{\"a\":1}");
        let mut with_bom = vec![0xEF, 0xBB, 0xBF];
        with_bom.extend_from_slice(b"{\"a\":1}");
        assert!(verifier.verify(&with_bom, Some(&sig)));
    }

    #[test]
    fn strip_bom_only_removes_leading_sequence() {
        assert_eq!(strip_bom(b"\xEF\xBB\xBFabc"), b"abc");
        assert_eq!(strip_bom(b"abc"), b"abc");
        // BOM bytes in the middle of the payload are part of the payload
        assert_eq!(strip_bom(b"a\xEF\xBB\xBFbc"), b"a\xEF\xBB\xBFbc");
        assert_eq!(strip_bom(b""), b"");
    }

    #[test]
    fn signature_length_mismatch_fails() {
        let verifier = SignatureVerifier::new("secret");
        let sig = sign_payload("secret", b"payload");
        assert!(!verifier.verify(b"payload", Some(&sig[..sig.len() - 2])));
    }
}
