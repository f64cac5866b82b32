//! HTTP Signatures (draft-cavage-http-signatures) for outbound deliveries.
//!
//! Every POST to a remote inbox carries:
//!
//! ```text
//! Date:      Tue, 07 Jun 2022 20:51:35 GMT
//! Digest:    SHA-256=<base64 of sha256(body)>
//! Signature: keyId="https://ferry.example/actor/<pubkey>#main-key",
//!            algorithm="hs2019",
//!            headers="(request-target) host date digest",
//!            signature="<base64>"
//! ```
//!
//! The signed string is one `name: value` line per entry of `headers`, joined
//! by `\n`, where `(request-target)` is `<lowercase method> <path[?query]>`.
//!
//! # Interop
//! The signature is Ed25519 under `hs2019`. Servers that only accept
//! `rsa-sha256` (Mastodon among them) reject these deliveries, so delivery
//! currently reaches only peers that verify Ed25519 keys. Inbound requests are
//! not verified.

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use url::Url;

use crate::{error::PubError, keys::ServerKeyPair};

const SIGNED_HEADERS: &str = "(request-target) host date digest";

// ─── Signing ─────────────────────────────────────────────────────────────────

/// Header values to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub host: String,
    pub date: String,
    pub digest: String,
    pub signature: String,
}

/// Sign an outbound request.
///
/// * `kp`     the server key pair
/// * `key_id` URL of the public key document (`{actor}#main-key`)
/// * `method` HTTP method (e.g. `"POST"`)
/// * `url`    full destination URL
/// * `body`   request body, hashed into the `Digest` header
/// * `now`    timestamp for the `Date` header
pub fn sign_request(
    kp: &ServerKeyPair,
    key_id: &str,
    method: &str,
    url: &Url,
    body: &[u8],
    now: DateTime<Utc>,
) -> Result<SignedHeaders, PubError> {
    let host = host_header(url)?;
    let date = http_date(now);
    let digest = digest_header(body);

    let signing_string = [
        format!("(request-target): {}", request_target(method, url)),
        format!("host: {host}"),
        format!("date: {date}"),
        format!("digest: {digest}"),
    ]
    .join("\n");
    let sig = kp.sign_bytes(signing_string.as_bytes());

    let signature = format!(
        r#"keyId="{key_id}",algorithm="hs2019",headers="{SIGNED_HEADERS}",signature="{sig}""#
    );
    Ok(SignedHeaders { host, date, digest, signature })
}

/// `SHA-256=<base64>` digest of a body.
pub fn digest_header(body: &[u8]) -> String {
    format!("SHA-256={}", base64::engine::general_purpose::STANDARD.encode(Sha256::digest(body)))
}

/// RFC 7231 IMF-fixdate.
pub fn http_date(now: DateTime<Utc>) -> String {
    now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ─── Internals ───────────────────────────────────────────────────────────────

fn host_header(url: &Url) -> Result<String, PubError> {
    let host = url
        .host_str()
        .ok_or_else(|| PubError::RemoteProtocol(url.to_string(), "URL has no host".into()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

fn request_target(method: &str, url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{} {}?{}", method.to_lowercase(), url.path(), query),
        None => format!("{} {}", method.to_lowercase(), url.path()),
    }
}
