//! Bridge-level error type.

use ferry_common::FerryError;
use ferry_db::StoreError;
use ferry_nostr::NostrError;
use ferry_pub::PubError;
use thiserror::Error;

/// Errors surfaced by the bridge engine.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed input from either protocol. Maps to 400.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// A signed POST to a remote inbox failed. Maps to 503.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// A remote ActivityPub server could not be read.
    #[error("Remote error: {0}")]
    Remote(#[from] PubError),

    #[error("Nostr error: {0}")]
    Nostr(#[from] NostrError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }
}

impl From<BridgeError> for FerryError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Validation(message) => FerryError::Validation { message },
            BridgeError::NotFound(resource) => FerryError::NotFound { resource },
            BridgeError::Persistence(e) => FerryError::Database(e.to_string()),
            BridgeError::Delivery(message) => FerryError::DeliveryFailed { message },
            BridgeError::Remote(e) => FerryError::Internal(anyhow::Error::new(e)),
            BridgeError::Nostr(e) => FerryError::Internal(anyhow::Error::new(e)),
            BridgeError::Internal(e) => FerryError::Internal(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_onto_http_taxonomy() {
        let cases: Vec<(BridgeError, u16)> = vec![
            (BridgeError::validation("bad"), 400),
            (BridgeError::not_found("actor"), 404),
            (BridgeError::Persistence(StoreError::Integrity("x".into())), 500),
            (BridgeError::Delivery("inbox down".into()), 503),
            (BridgeError::Internal(anyhow::anyhow!("boom")), 500),
        ];
        for (err, status) in cases {
            assert_eq!(FerryError::from(err).status_code().as_u16(), status);
        }
    }
}
