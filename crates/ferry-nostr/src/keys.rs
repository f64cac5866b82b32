//! secp256k1 key pairs and BIP-340 Schnorr signatures.
//!
//! Signatures are produced without auxiliary randomness, so signing the same
//! id with the same key always yields the same signature. The bridge relies on
//! this to keep translated events byte-stable across re-translation.

use std::fmt;

use secp256k1::{Keypair, Message, SECP256K1, SecretKey, XOnlyPublicKey, schnorr};

use crate::error::NostrError;

// ─── Key pair ────────────────────────────────────────────────────────────────

/// A Nostr signing key pair.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public: XOnlyPublicKey,
}

impl Keys {
    /// Build a key pair from a 32-byte secret.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, NostrError> {
        let secret = SecretKey::from_slice(bytes).map_err(|_| NostrError::InvalidSecretKey)?;
        let keypair = Keypair::from_secret_key(SECP256K1, &secret);
        let (public, _parity) = keypair.x_only_public_key();
        Ok(Self { keypair, public })
    }

    /// Hex-encoded 32-byte x-only public key.
    pub fn public_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    /// Hex-encoded 32-byte secret key.
    pub fn secret_hex(&self) -> String {
        hex::encode(self.keypair.secret_bytes())
    }

    /// Sign a hex-encoded 32-byte event id and return the hex signature.
    pub fn sign_id(&self, id_hex: &str) -> Result<String, NostrError> {
        let message = Message::from_digest(digest_from_hex(id_hex)?);
        let sig = SECP256K1.sign_schnorr_no_aux_rand(&message, &self.keypair);
        Ok(hex::encode(sig.serialize()))
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys").field("public", &self.public_hex()).finish_non_exhaustive()
    }
}

impl PartialEq for Keys {
    fn eq(&self, other: &Self) -> bool {
        self.keypair.secret_bytes() == other.keypair.secret_bytes()
    }
}

impl Eq for Keys {}

// ─── Verification ─────────────────────────────────────────────────────────────

/// Verify a Schnorr signature over a hex event id.
pub fn verify_schnorr(pubkey_hex: &str, id_hex: &str, sig_hex: &str) -> Result<(), NostrError> {
    let invalid = || NostrError::InvalidSignature(id_hex.to_owned());

    let pubkey_bytes =
        hex::decode(pubkey_hex).map_err(|_| NostrError::InvalidPublicKey(pubkey_hex.to_owned()))?;
    let pubkey = XOnlyPublicKey::from_slice(&pubkey_bytes)
        .map_err(|_| NostrError::InvalidPublicKey(pubkey_hex.to_owned()))?;
    let sig_bytes = hex::decode(sig_hex).map_err(|_| invalid())?;
    let sig = schnorr::Signature::from_slice(&sig_bytes).map_err(|_| invalid())?;
    let message = Message::from_digest(digest_from_hex(id_hex).map_err(|_| invalid())?);

    SECP256K1.verify_schnorr(&sig, &message, &pubkey).map_err(|_| invalid())
}

/// True if `value` is 64 hex characters (a pubkey or an event id).
pub fn is_hex32(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

fn digest_from_hex(id_hex: &str) -> Result<[u8; 32], NostrError> {
    let bytes = hex::decode(id_hex)?;
    bytes.try_into().map_err(|_| NostrError::Hex(hex::FromHexError::InvalidStringLength))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    #[test]
    fn sign_then_verify() {
        let keys = Keys::from_secret_bytes(&[7u8; 32]).unwrap();
        let sig = keys.sign_id(ID).unwrap();
        verify_schnorr(&keys.public_hex(), ID, &sig).expect("signature should verify");
    }

    #[test]
    fn signing_is_deterministic() {
        let keys = Keys::from_secret_bytes(&[9u8; 32]).unwrap();
        assert_eq!(keys.sign_id(ID).unwrap(), keys.sign_id(ID).unwrap());
    }

    #[test]
    fn wrong_key_fails_verification() {
        let signer = Keys::from_secret_bytes(&[1u8; 32]).unwrap();
        let other = Keys::from_secret_bytes(&[2u8; 32]).unwrap();
        let sig = signer.sign_id(ID).unwrap();
        assert!(verify_schnorr(&other.public_hex(), ID, &sig).is_err());
    }

    #[test]
    fn zero_secret_is_rejected() {
        assert!(matches!(Keys::from_secret_bytes(&[0u8; 32]), Err(NostrError::InvalidSecretKey)));
    }

    #[test]
    fn hex32_detection() {
        assert!(is_hex32(ID));
        assert!(!is_hex32("abc"));
        assert!(!is_hex32(&"zz".repeat(32)));
    }
}
