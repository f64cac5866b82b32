//! Event cache with replaceable-event semantics and TTL expiry.
//!
//! Kinds 0 and 3 are replaceable: one live row per `(kind, pubkey)`, and a
//! write only lands if it is strictly newer than the live row. An equal
//! `created_at` is a duplicate; an expired row never blocks a write. Kind 1 is
//! appendable: one row per event id. Every write sets `expires_at = now + ttl`
//! no matter how old the event is; expired rows are invisible to reads and
//! removed by [`EventCache::purge_expired`].

use std::{fmt, sync::Arc, time::Duration};

use chrono::Utc;
use ferry_db::{BridgeStore, CacheRow};
use ferry_nostr::{Event, kind};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::BridgeError;

/// Cache key of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    /// `"{kind}:{pubkey}"`.
    Replaceable { kind: u16, pubkey: String },
    /// `"1:{id}"`.
    Appendable { id: String },
}

impl CacheKey {
    /// Key for `event`, or `None` if its kind is not cached.
    pub fn for_event(event: &Event) -> Option<Self> {
        match event.kind {
            kind::METADATA | kind::CONTACTS => {
                Some(Self::Replaceable { kind: event.kind, pubkey: event.pubkey.clone() })
            }
            kind::TEXT_NOTE => Some(Self::Appendable { id: event.id.clone() }),
            _ => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replaceable { kind, pubkey } => write!(f, "{kind}:{pubkey}"),
            Self::Appendable { id } => write!(f, "{}:{id}", kind::TEXT_NOTE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    Stored,
    /// A replaceable event no newer than the stored one; nothing written.
    Stale,
    /// Kind is not cached.
    Rejected,
}

#[derive(Clone)]
pub struct EventCache {
    store: Arc<dyn BridgeStore>,
    ttl: Duration,
}

impl EventCache {
    pub fn new(store: Arc<dyn BridgeStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn put(&self, event: &Event) -> Result<CacheOutcome, BridgeError> {
        let Some(key) = CacheKey::for_event(event) else {
            warn!("Refusing to cache event {} of kind {}", event.id, event.kind);
            return Ok(CacheOutcome::Rejected);
        };

        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| BridgeError::Internal(anyhow::anyhow!("cache ttl out of range: {e}")))?;
        let row = CacheRow {
            key: key.to_string(),
            kind: i32::from(event.kind),
            pubkey: event.pubkey.clone(),
            value: serde_json::to_string(event).map_err(|e| BridgeError::Internal(e.into()))?,
            created_at: event.created_at,
            expires_at: Utc::now() + ttl,
        };

        match key {
            CacheKey::Replaceable { .. } => {
                if self.store.cache_put_replaceable(&row).await? {
                    Ok(CacheOutcome::Stored)
                } else {
                    debug!("Cache already holds a newer {}", row.key);
                    Ok(CacheOutcome::Stale)
                }
            }
            CacheKey::Appendable { .. } => {
                self.store.cache_put_appendable(&row).await?;
                Ok(CacheOutcome::Stored)
            }
        }
    }

    /// Cache `event` on a detached task. Failures are logged.
    pub fn spawn_put(&self, event: Event) {
        let cache = self.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.put(&event).await {
                error!("Failed to cache event {}: {}", event.id, e);
            }
        });
    }

    pub async fn get_by_key(&self, key: &CacheKey) -> Option<Event> {
        let key = key.to_string();
        match self.store.cache_get(&key, Utc::now()).await {
            Ok(row) => row.and_then(|row| decode(&row)),
            Err(e) => {
                error!("Cache read for {} failed: {}", key, e);
                None
            }
        }
    }

    pub async fn profile(&self, pubkey: &str) -> Option<Event> {
        self.get_by_key(&CacheKey::Replaceable { kind: kind::METADATA, pubkey: pubkey.to_owned() })
            .await
    }

    pub async fn contacts(&self, pubkey: &str) -> Option<Event> {
        self.get_by_key(&CacheKey::Replaceable { kind: kind::CONTACTS, pubkey: pubkey.to_owned() })
            .await
    }

    pub async fn note(&self, id: &str) -> Option<Event> {
        self.get_by_key(&CacheKey::Appendable { id: id.to_owned() }).await
    }

    /// Cached notes by `pubkey`, newest first.
    pub async fn list_notes(&self, pubkey: &str, limit: usize, offset: usize) -> Vec<Event> {
        let rows = self
            .store
            .cache_list(
                pubkey,
                i32::from(kind::TEXT_NOTE),
                i64::try_from(limit).unwrap_or(i64::MAX),
                i64::try_from(offset).unwrap_or(i64::MAX),
                Utc::now(),
            )
            .await;
        match rows {
            Ok(rows) => rows.iter().filter_map(decode).collect(),
            Err(e) => {
                error!("Cache listing for {} failed: {}", pubkey, e);
                Vec::new()
            }
        }
    }

    pub async fn remove(&self, key: &CacheKey) -> Result<bool, BridgeError> {
        Ok(self.store.cache_delete(&key.to_string()).await?)
    }

    pub async fn purge_expired(&self) -> Result<u64, BridgeError> {
        Ok(self.store.cache_purge_expired(Utc::now()).await?)
    }

    /// Purge expired rows every `interval` until the task is aborted.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.purge_expired().await {
                    Ok(0) => debug!("Cache GC: nothing expired"),
                    Ok(n) => info!("Cache GC: purged {} expired events", n),
                    Err(e) => error!("Cache GC failed: {}", e),
                }
            }
        })
    }
}

fn decode(row: &CacheRow) -> Option<Event> {
    match serde_json::from_str(&row.value) {
        Ok(event) => Some(event),
        Err(e) => {
            error!("Cached value under {} is not an event: {}", row.key, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_db::MemoryStore;
    use ferry_nostr::{EventBuilder, Keys};

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[9u8; 32]).unwrap()
    }

    fn cache_with(store: Arc<MemoryStore>, ttl: Duration) -> EventCache {
        EventCache::new(store, ttl)
    }

    fn profile(created_at: i64, name: &str) -> Event {
        EventBuilder::new(kind::METADATA, created_at, format!(r#"{{"name":"{name}"}}"#))
            .sign(&keys())
            .unwrap()
    }

    #[test]
    fn key_formats() {
        let note = EventBuilder::new(kind::TEXT_NOTE, 1, "x").sign(&keys()).unwrap();
        assert_eq!(CacheKey::for_event(&note).unwrap().to_string(), format!("1:{}", note.id));
        let meta = profile(1, "a");
        assert_eq!(CacheKey::for_event(&meta).unwrap().to_string(), format!("0:{}", meta.pubkey));
    }

    #[tokio::test]
    async fn newest_replaceable_wins() {
        let cache = cache_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));

        assert_eq!(cache.put(&profile(100, "a")).await.unwrap(), CacheOutcome::Stored);
        assert_eq!(cache.put(&profile(50, "b")).await.unwrap(), CacheOutcome::Stale);
        assert_eq!(cache.profile(&keys().public_hex()).await.unwrap().created_at, 100);

        assert_eq!(cache.put(&profile(150, "c")).await.unwrap(), CacheOutcome::Stored);
        let current = cache.profile(&keys().public_hex()).await.unwrap();
        assert_eq!(current.created_at, 150);
        assert!(current.content.contains("\"c\""));
    }

    #[tokio::test]
    async fn equal_timestamp_is_a_duplicate() {
        let cache = cache_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));

        assert_eq!(cache.put(&profile(100, "a")).await.unwrap(), CacheOutcome::Stored);
        assert_eq!(cache.put(&profile(100, "b")).await.unwrap(), CacheOutcome::Stale);
        let current = cache.profile(&keys().public_hex()).await.unwrap();
        assert!(current.content.contains("\"a\""));
    }

    #[tokio::test]
    async fn expired_profile_can_be_refreshed_before_gc() {
        let store = Arc::new(MemoryStore::new());
        let short = cache_with(store.clone(), Duration::ZERO);
        let long = cache_with(store.clone(), Duration::from_secs(600));
        let event = profile(100, "a");

        assert_eq!(short.put(&event).await.unwrap(), CacheOutcome::Stored);
        assert!(long.profile(&keys().public_hex()).await.is_none());

        assert_eq!(long.put(&event).await.unwrap(), CacheOutcome::Stored);
        assert_eq!(long.profile(&keys().public_hex()).await.unwrap().id, event.id);
    }

    #[tokio::test]
    async fn deletion_events_are_not_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), Duration::from_secs(60));
        let deletion = EventBuilder::new(kind::DELETION, 1, "").tag(["e", "abc"]).sign(&keys()).unwrap();

        assert_eq!(cache.put(&deletion).await.unwrap(), CacheOutcome::Rejected);
        assert_eq!(store.cache_len().await, 0);
    }

    #[tokio::test]
    async fn notes_list_newest_first() {
        let cache = cache_with(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        for ts in [10, 30, 20] {
            let note = EventBuilder::new(kind::TEXT_NOTE, ts, format!("n{ts}")).sign(&keys()).unwrap();
            cache.put(&note).await.unwrap();
        }
        let listed: Vec<i64> =
            cache.list_notes(&keys().public_hex(), 10, 0).await.iter().map(|e| e.created_at).collect();
        assert_eq!(listed, vec![30, 20, 10]);
        assert_eq!(cache.list_notes(&keys().public_hex(), 1, 1).await[0].created_at, 20);
    }

    #[tokio::test]
    async fn expired_rows_are_invisible_then_purged() {
        let store = Arc::new(MemoryStore::new());
        let cache = cache_with(store.clone(), Duration::ZERO);
        let note = EventBuilder::new(kind::TEXT_NOTE, 1, "gone").sign(&keys()).unwrap();

        cache.put(&note).await.unwrap();
        assert!(cache.note(&note.id).await.is_none());
        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(store.cache_len().await, 0);
    }
}
