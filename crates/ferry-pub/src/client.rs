//! Outbound HTTP: fetching remote objects and delivering signed activities.
//!
//! Two seams are exposed as traits so the bridge can be exercised without a
//! network: [`PubClient`] for reads and [`Delivery`] for signed POSTs.
//! [`HttpPubClient`] implements both over `reqwest`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::{
    error::PubError,
    keys::ServerKeyPair,
    signatures::sign_request,
    types::{ACTIVITY_JSON, Actor, Note, RemoteCollection, WebFinger},
};

const ACCEPT_AP: &str =
    r#"application/activity+json, application/ld+json; profile="https://www.w3.org/ns/activitystreams""#;

/// Reads ActivityPub documents from remote servers.
#[async_trait]
pub trait PubClient: Send + Sync {
    async fn fetch_actor(&self, url: &str) -> Result<Actor, PubError>;
    async fn fetch_note(&self, url: &str) -> Result<Note, PubError>;
    async fn fetch_collection(&self, url: &str) -> Result<RemoteCollection, PubError>;
    /// Resolve `user@domain` to an actor URL through WebFinger.
    async fn resolve_webfinger(&self, account: &str) -> Result<String, PubError>;
}

/// Posts a signed activity to one inbox.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, key_id: &str, inbox: &str, activity: &Value) -> Result<(), PubError>;
}

// ─── Client ──────────────────────────────────────────────────────────────────

pub struct HttpPubClient {
    key_pair: Arc<ServerKeyPair>,
    http: Client,
}

impl HttpPubClient {
    pub fn new(key_pair: Arc<ServerKeyPair>) -> Result<Self, PubError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("Ferry/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { key_pair, http })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, accept: &str) -> Result<T, PubError> {
        debug!("Fetching {}", url);
        let resp = self
            .http
            .get(url)
            .header(header::ACCEPT, accept)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| PubError::RemoteHttp(url.to_owned(), e.to_string()))?;
        let body: Value = resp.json().await?;
        serde_json::from_value(body).map_err(|e| PubError::RemoteProtocol(url.to_owned(), e.to_string()))
    }
}

#[async_trait]
impl PubClient for HttpPubClient {
    async fn fetch_actor(&self, url: &str) -> Result<Actor, PubError> {
        self.get_json(url, ACCEPT_AP).await
    }

    async fn fetch_note(&self, url: &str) -> Result<Note, PubError> {
        self.get_json(url, ACCEPT_AP).await
    }

    async fn fetch_collection(&self, url: &str) -> Result<RemoteCollection, PubError> {
        self.get_json(url, ACCEPT_AP).await
    }

    async fn resolve_webfinger(&self, account: &str) -> Result<String, PubError> {
        let account = account.trim_start_matches('@').trim_start_matches("acct:");
        let (_, domain) = account.split_once('@').ok_or_else(|| {
            PubError::RemoteProtocol(account.to_owned(), "expected user@domain".into())
        })?;
        let url = format!(
            "https://{domain}/.well-known/webfinger?resource={}",
            urlencoded(&format!("acct:{account}"))
        );
        let doc: WebFinger = self.get_json(&url, "application/jrd+json, application/json").await?;
        doc.actor_url()
            .map(str::to_owned)
            .ok_or_else(|| PubError::RemoteProtocol(url, "no ActivityPub self link".into()))
    }
}

#[async_trait]
impl Delivery for HttpPubClient {
    async fn deliver(&self, key_id: &str, inbox: &str, activity: &Value) -> Result<(), PubError> {
        let url = Url::parse(inbox)?;
        let body = serde_json::to_vec(activity)?;
        let signed = sign_request(&self.key_pair, key_id, "POST", &url, &body, Utc::now())?;

        let resp = self
            .http
            .post(url)
            .header(header::CONTENT_TYPE, ACTIVITY_JSON)
            .header(header::HOST, signed.host)
            .header(header::DATE, signed.date)
            .header("Digest", signed.digest)
            .header("Signature", signed.signature)
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("Delivered to {} ({})", inbox, status);
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PubError::Delivery { inbox: inbox.to_owned(), status: status.as_u16(), body })
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn urlencoded(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}
