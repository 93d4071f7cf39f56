//! Signed requests and signature verification.
//!
//! Clients prove control of an address by signing the request payload with
//! the ed25519 key the address was derived from. Verification is a
//! collaborator seam: the saga and the key resolver only see the
//! [`SignatureVerifier`] trait, so deployments can swap in whatever scheme
//! their network uses.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Number of address bytes kept from the hashed public key.
const ADDRESS_BYTES: usize = 20;

/// A request payload accompanied by a signature provable against an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    /// Address the signer claims to control.
    pub address: String,
    /// The signed payload, carried as free-form JSON.
    pub payload: serde_json::Value,
    /// Hex-encoded ed25519 public key of the signer.
    pub public_key: String,
    /// Hex-encoded signature over the canonical payload bytes.
    pub signature: String,
}

impl SignedRequest {
    /// Sign a payload with the given key, claiming the derived address.
    #[must_use]
    pub fn sign(key: &SigningKey, payload: serde_json::Value) -> Self {
        let message = canonical_bytes(&payload);
        let signature = key.sign(&message);
        Self {
            address: derive_address(&key.verifying_key()),
            payload,
            public_key: hex::encode(key.verifying_key().to_bytes()),
            signature: hex::encode(signature.to_bytes()),
        }
    }
}

/// Derive the network address bound to a public key.
///
/// The address is the hex of the first 20 bytes of the SHA-256 of the raw
/// public key, prefixed with `0x`.
#[must_use]
pub fn derive_address(key: &VerifyingKey) -> String {
    let digest = Sha256::digest(key.to_bytes());
    format!("0x{}", hex::encode(&digest[..ADDRESS_BYTES]))
}

/// Validates that a signed request was produced by the claimed address.
pub trait SignatureVerifier: Send + Sync {
    /// Returns true if `request` was signed by the key behind `address`.
    fn is_valid(&self, address: &str, request: &SignedRequest) -> bool;
}

/// Ed25519 verifier binding addresses to hashed public keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl Ed25519Verifier {
    /// Create a new verifier.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn is_valid(&self, address: &str, request: &SignedRequest) -> bool {
        let Some(key) = decode_public_key(&request.public_key) else {
            debug!("Rejecting request: malformed public key");
            return false;
        };

        if derive_address(&key) != address {
            debug!("Rejecting request: public key does not derive {address}");
            return false;
        }

        let Some(signature) = decode_signature(&request.signature) else {
            debug!("Rejecting request: malformed signature");
            return false;
        };

        let message = canonical_bytes(&request.payload);
        key.verify(&message, &signature).is_ok()
    }
}

fn canonical_bytes(payload: &serde_json::Value) -> Vec<u8> {
    // serde_json renders maps in a stable order for a given Value, which is
    // enough for sign-then-verify of the same payload instance.
    payload.to_string().into_bytes()
}

fn decode_public_key(hex_key: &str) -> Option<VerifyingKey> {
    let bytes = hex::decode(hex_key).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    VerifyingKey::from_bytes(&bytes).ok()
}

fn decode_signature(hex_sig: &str) -> Option<Signature> {
    let bytes = hex::decode(hex_sig).ok()?;
    let bytes: [u8; 64] = bytes.try_into().ok()?;
    Some(Signature::from_bytes(&bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    fn keypair() -> SigningKey {
        SigningKey::generate(&mut OsRng)
    }

    /// Test 1: a request signed for an address verifies against it.
    #[test]
    fn test_valid_signature_accepted() {
        let key = keypair();
        let request = SignedRequest::sign(&key, serde_json::json!({"fileId": "abc"}));

        let verifier = Ed25519Verifier::new();
        assert!(verifier.is_valid(&request.address, &request));
    }

    /// Test 2: verifying against a different address fails.
    #[test]
    fn test_wrong_address_rejected() {
        let key = keypair();
        let other = derive_address(&keypair().verifying_key());
        let request = SignedRequest::sign(&key, serde_json::json!({"fileId": "abc"}));

        let verifier = Ed25519Verifier::new();
        assert!(!verifier.is_valid(&other, &request));
    }

    /// Test 3: a tampered payload fails verification.
    #[test]
    fn test_tampered_payload_rejected() {
        let key = keypair();
        let mut request = SignedRequest::sign(&key, serde_json::json!({"fileId": "abc"}));
        request.payload = serde_json::json!({"fileId": "evil"});

        let verifier = Ed25519Verifier::new();
        assert!(!verifier.is_valid(&request.address, &request));
    }

    /// Test 4: a signature from a different key fails verification.
    #[test]
    fn test_wrong_key_rejected() {
        let key = keypair();
        let imposter = keypair();
        let payload = serde_json::json!({"fileId": "abc"});

        let mut request = SignedRequest::sign(&imposter, payload.clone());
        // Claim the honest signer's address with the imposter's signature.
        request.address = derive_address(&key.verifying_key());

        let verifier = Ed25519Verifier::new();
        assert!(!verifier.is_valid(&request.address, &request));
    }

    /// Test 5: malformed key or signature material is rejected, not a panic.
    #[test]
    fn test_malformed_material_rejected() {
        let key = keypair();
        let verifier = Ed25519Verifier::new();

        let mut request = SignedRequest::sign(&key, serde_json::json!({}));
        request.public_key = "zz-not-hex".to_string();
        assert!(!verifier.is_valid(&request.address, &request));

        let mut request = SignedRequest::sign(&key, serde_json::json!({}));
        request.signature = "abcd".to_string();
        assert!(!verifier.is_valid(&request.address, &request));
    }

    /// Test 6: derived addresses are stable and 0x-prefixed.
    #[test]
    fn test_address_shape() {
        let key = keypair();
        let address = derive_address(&key.verifying_key());
        assert!(address.starts_with("0x"));
        assert_eq!(address.len(), 2 + ADDRESS_BYTES * 2);
        assert_eq!(address, derive_address(&key.verifying_key()));
    }
}
