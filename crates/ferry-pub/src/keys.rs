//! Ed25519 server signing key.
//!
//! The bridge owns a single Ed25519 key pair. It signs every outbound
//! delivery, and every bridged actor document advertises its public half as
//! `{actor}#main-key`. The 32-byte seed doubles as the default identity
//! derivation secret, so losing it changes every derived Nostr identity.
//!
//! # Key IDs
//! Stored keys are identified by `ed25519:<fingerprint>`, the first 6 bytes of
//! the public key hex-encoded.

use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use rand_core::OsRng;

use crate::error::PubError;

/// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410).
const ED25519_SPKI_PREFIX: [u8; 12] =
    [0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00];

// ─── Key pair ────────────────────────────────────────────────────────────────

pub struct ServerKeyPair {
    /// Key ID in the format `ed25519:<12-char-hex>`.
    pub key_id: String,
    signing_key: SigningKey,
}

impl ServerKeyPair {
    /// Generate a brand-new random Ed25519 key pair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let key_id = derive_key_id(signing_key.verifying_key().as_bytes());
        Self { key_id, signing_key }
    }

    /// Reconstruct a `ServerKeyPair` from raw 32-byte seed bytes (as stored in DB).
    pub fn from_seed(seed: &[u8]) -> Result<Self, PubError> {
        let bytes: [u8; 32] = seed
            .try_into()
            .map_err(|_| PubError::KeyLoad("seed must be exactly 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(&bytes);
        let key_id = derive_key_id(signing_key.verifying_key().as_bytes());
        Ok(Self { key_id, signing_key })
    }

    /// Return the 32-byte seed for persistence.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Public key as unpadded base64url (storage form).
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(self.signing_key.verifying_key().as_bytes())
    }

    /// Public key as a PEM-encoded SubjectPublicKeyInfo, for `publicKeyPem`.
    pub fn public_key_pem(&self) -> String {
        let mut der = ED25519_SPKI_PREFIX.to_vec();
        der.extend_from_slice(self.signing_key.verifying_key().as_bytes());
        let body = base64::engine::general_purpose::STANDARD.encode(der);
        format!("-----BEGIN PUBLIC KEY-----\n{body}\n-----END PUBLIC KEY-----\n")
    }

    /// Sign arbitrary bytes and return the standard base64 signature.
    pub fn sign_bytes(&self, bytes: &[u8]) -> String {
        let sig = self.signing_key.sign(bytes);
        base64::engine::general_purpose::STANDARD.encode(sig.to_bytes())
    }
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair").field("key_id", &self.key_id).finish_non_exhaustive()
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn derive_key_id(pubkey_bytes: &[u8]) -> String {
    format!("ed25519:{}", hex::encode(&pubkey_bytes[..6]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    fn verifies(kp: &ServerKeyPair, sig_base64: &str, message: &[u8]) -> bool {
        let bytes = base64::engine::general_purpose::STANDARD.decode(sig_base64).unwrap();
        let signature = ed25519_dalek::Signature::from_slice(&bytes).unwrap();
        kp.signing_key.verifying_key().verify(message, &signature).is_ok()
    }

    #[test]
    fn round_trip_sign_verify() {
        let kp = ServerKeyPair::generate();
        let msg = b"hello fediverse";
        let sig = kp.sign_bytes(msg);
        assert!(verifies(&kp, &sig, msg));
        assert!(!verifies(&kp, &sig, b"other"));
    }

    #[test]
    fn from_seed_is_stable() {
        let kp1 = ServerKeyPair::generate();
        let kp2 = ServerKeyPair::from_seed(&kp1.seed_bytes()).unwrap();
        assert_eq!(kp1.key_id, kp2.key_id);
        assert_eq!(kp1.public_key_base64(), kp2.public_key_base64());
    }

    #[test]
    fn short_seed_is_rejected() {
        assert!(matches!(ServerKeyPair::from_seed(&[1u8; 16]), Err(PubError::KeyLoad(_))));
    }

    #[test]
    fn pem_wraps_spki_der() {
        let kp = ServerKeyPair::from_seed(&[4u8; 32]).unwrap();
        let pem = kp.public_key_pem();
        let body = pem
            .strip_prefix("-----BEGIN PUBLIC KEY-----\n")
            .and_then(|rest| rest.strip_suffix("\n-----END PUBLIC KEY-----\n"))
            .unwrap();
        let der = base64::engine::general_purpose::STANDARD.decode(body).unwrap();
        assert_eq!(der.len(), 44);
        assert_eq!(&der[..12], &ED25519_SPKI_PREFIX);
        assert_eq!(&der[12..], kp.signing_key.verifying_key().as_bytes());
    }
}
