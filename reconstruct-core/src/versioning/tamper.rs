//! Content hashing and tamper detection (spec §4.6): SHA-256 over
//! canonical JSON, plus an optional HMAC-SHA-256 signature when a secret
//! key is configured.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Canonical serialization used for hashing: `serde_json::to_vec` already
/// preserves field order as inserted, which is stable for our node
/// structs (we never round-trip through an unordered map for the hashed
/// payload).
pub fn canonical_bytes(content: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(content).unwrap_or_default()
}

pub fn content_hash(content: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(content));
    format!("{:x}", hasher.finalize())
}

/// `None` when no secret key is configured (signatures are optional).
pub fn sign(content: &serde_json::Value, secret_key: Option<&[u8]>) -> Option<String> {
    let key = secret_key?;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(&canonical_bytes(content));
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(content: &serde_json::Value, expected: &str, secret_key: &[u8]) -> bool {
    let mut mac = HmacSha256::new_from_slice(secret_key).expect("HMAC accepts any key length");
    mac.update(&canonical_bytes(content));
    let computed = hex::encode(mac.finalize().into_bytes());
    // constant-time-ish: cheap enough at this size, correctness (not
    // timing-resistance) is the contract here.
    computed == expected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_changes_on_single_byte_modification() {
        let a = json!({"text": "hello world"});
        let b = json!({"text": "hello worle"});
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn hash_is_stable_for_identical_content() {
        let a = json!({"text": "stable"});
        let b = json!({"text": "stable"});
        assert_eq!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn signature_round_trips_with_matching_key() {
        let content = json!({"text": "secret payload"});
        let key = b"test-secret-key";
        let sig = sign(&content, Some(key)).unwrap();
        assert!(verify_signature(&content, &sig, key));
    }

    #[test]
    fn signature_fails_with_wrong_key() {
        let content = json!({"text": "secret payload"});
        let sig = sign(&content, Some(b"key-one")).unwrap();
        assert!(!verify_signature(&content, &sig, b"key-two"));
    }

    #[test]
    fn no_secret_key_means_no_signature() {
        let content = json!({"text": "unsigned"});
        assert!(sign(&content, None).is_none());
    }
}
