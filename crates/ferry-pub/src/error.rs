//! ActivityPub-specific error types.

use thiserror::Error;

/// Errors that can occur while talking to ActivityPub peers.
#[derive(Debug, Error)]
pub enum PubError {
    // ── Key management ──────────────────────────────────────────────────────

    #[error("Failed to load signing key: {0}")]
    KeyLoad(String),

    // ── Inbound activities ──────────────────────────────────────────────────

    #[error("Malformed activity: {0}")]
    MalformedActivity(String),

    // ── Remote communication ─────────────────────────────────────────────────

    #[error("HTTP error communicating with '{0}': {1}")]
    RemoteHttp(String, String),

    #[error("'{0}' returned an unexpected document: {1}")]
    RemoteProtocol(String, String),

    #[error("Delivery to '{inbox}' failed with status {status}: {body}")]
    Delivery { inbox: String, status: u16, body: String },

    // ── General ─────────────────────────────────────────────────────────────

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl From<reqwest::Error> for PubError {
    fn from(e: reqwest::Error) -> Self {
        let target = e.url().map(|u| u.to_string()).unwrap_or_default();
        PubError::RemoteHttp(target, e.to_string())
    }
}
