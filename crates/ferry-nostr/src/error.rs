//! Nostr-specific error types.

use thiserror::Error;

/// Errors that can occur while handling Nostr events or talking to relays.
#[derive(Debug, Error)]
pub enum NostrError {
    // ── Keys and signatures ─────────────────────────────────────────────────

    #[error("Secret key is not a valid secp256k1 scalar")]
    InvalidSecretKey,

    #[error("Invalid public key '{0}'")]
    InvalidPublicKey(String),

    #[error("Event id does not match its content (claimed '{0}')")]
    IdMismatch(String),

    #[error("Signature verification failed for event '{0}'")]
    InvalidSignature(String),

    #[error("Malformed hex: {0}")]
    Hex(#[from] hex::FromHexError),

    // ── Wire format ─────────────────────────────────────────────────────────

    #[error("Malformed relay message: {0}")]
    MalformedMessage(String),

    #[error("Malformed filter: {0}")]
    MalformedFilter(String),

    // ── Remote relays ───────────────────────────────────────────────────────

    #[error("Failed to connect to relay '{0}': {1}")]
    Connect(String, String),

    #[error("Transport error talking to relay '{0}': {1}")]
    Transport(String, String),

    // ── General ─────────────────────────────────────────────────────────────

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}
