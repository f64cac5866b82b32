//! Resolved bridge settings and the URL scheme for locally minted objects.

use std::time::Duration;

use ferry_common::AppConfig;

/// Values every bridge component needs, resolved once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// Base URL without a trailing slash.
    pub service_url: String,
    pub service_host: String,
    /// Relay hint placed in `e` and `p` tags.
    pub relay_url: String,
    pub cache_ttl: Duration,
    pub max_event_bytes: usize,
    pub outbox_page_size: usize,
    pub max_reply_depth: usize,
    /// PEM of the server key, advertised in every actor document.
    pub public_key_pem: String,
}

impl BridgeSettings {
    pub fn from_config(config: &AppConfig, public_key_pem: String) -> Self {
        Self {
            service_url: config.server.service_url.trim_end_matches('/').to_owned(),
            service_host: config.service_host(),
            relay_url: config.server.relay_url.clone(),
            cache_ttl: config.bridge.cache_ttl(),
            max_event_bytes: config.bridge.max_event_bytes,
            outbox_page_size: config.bridge.outbox_page_size.max(1),
            max_reply_depth: config.bridge.max_reply_depth,
            public_key_pem,
        }
    }

    // ── Local URLs ──────────────────────────────────────────────────────────

    pub fn actor_url(&self, pubkey: &str) -> String {
        format!("{}/actor/{pubkey}", self.service_url)
    }

    pub fn key_id(&self, pubkey: &str) -> String {
        format!("{}#main-key", self.actor_url(pubkey))
    }

    pub fn followers_url(&self, pubkey: &str) -> String {
        format!("{}/followers", self.actor_url(pubkey))
    }

    pub fn following_url(&self, pubkey: &str) -> String {
        format!("{}/following", self.actor_url(pubkey))
    }

    pub fn outbox_url(&self, pubkey: &str) -> String {
        format!("{}/outbox", self.actor_url(pubkey))
    }

    /// The shared inbox every bridged actor advertises.
    pub fn inbox_url(&self) -> String {
        format!("{}/inbox", self.service_url)
    }

    pub fn note_url(&self, id: &str) -> String {
        format!("{}/note/{id}", self.service_url)
    }

    pub fn create_url(&self, id: &str) -> String {
        format!("{}/activity", self.note_url(id))
    }

    pub fn accept_url(&self, pubkey: &str, follow_id: &str) -> String {
        let suffix = follow_id.rsplit('/').next().unwrap_or(follow_id);
        format!("{}/accept/{suffix}", self.actor_url(pubkey))
    }

    /// Pubkey of a local actor URL (`{service}/actor/{pubkey}`), if it is one.
    pub fn local_pubkey<'a>(&self, actor_url: &'a str) -> Option<&'a str> {
        actor_url
            .strip_prefix(self.service_url.as_str())
            .and_then(|rest| rest.strip_prefix("/actor/"))
            .filter(|pubkey| ferry_nostr::keys::is_hex32(pubkey))
    }
}
