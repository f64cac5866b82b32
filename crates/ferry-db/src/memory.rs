//! In-memory [`BridgeStore`].
//!
//! Same semantics as the PostgreSQL store, held in maps behind one
//! `tokio::sync::RwLock`. Holding the write lock across check and write gives
//! the replaceable upsert the same atomicity as the conditional SQL statement.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    error::StoreError,
    models::{ActorShadow, CacheRow, IdentityRecord, NoteMapping, NoteShadow, ServerKeyRecord},
    store::BridgeStore,
};

#[derive(Default)]
struct State {
    cache: HashMap<String, CacheRow>,
    /// pubkey -> record
    identities: HashMap<String, IdentityRecord>,
    /// pubkey -> followers in insertion order
    followers: HashMap<String, Vec<String>>,
    /// note_url -> mapping
    note_to_event: HashMap<String, NoteMapping>,
    event_to_note: HashMap<String, String>,
    actors: HashMap<String, ActorShadow>,
    notes: HashMap<String, NoteShadow>,
    server_keys: Vec<ServerKeyRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cache rows held, expired ones included.
    pub async fn cache_len(&self) -> usize {
        self.state.read().await.cache.len()
    }

    pub async fn note_mapping_len(&self) -> usize {
        self.state.read().await.note_to_event.len()
    }
}

#[async_trait]
impl BridgeStore for MemoryStore {
    async fn cache_put_replaceable(&self, row: &CacheRow) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let stale = state
            .cache
            .get(&row.key)
            .is_some_and(|live| live.expires_at > now && live.created_at >= row.created_at);
        if stale {
            return Ok(false);
        }
        state.cache.insert(row.key.clone(), row.clone());
        Ok(true)
    }

    async fn cache_put_appendable(&self, row: &CacheRow) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .cache
            .entry(row.key.clone())
            .and_modify(|existing| existing.expires_at = row.expires_at)
            .or_insert_with(|| row.clone());
        Ok(())
    }

    async fn cache_get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheRow>, StoreError> {
        let state = self.state.read().await;
        Ok(state.cache.get(key).filter(|row| row.expires_at > now).cloned())
    }

    async fn cache_list(
        &self,
        pubkey: &str,
        kind: i32,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheRow>, StoreError> {
        let state = self.state.read().await;
        let mut rows: Vec<CacheRow> = state
            .cache
            .values()
            .filter(|row| row.pubkey == pubkey && row.kind == kind && row.expires_at > now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.key.cmp(&b.key)));
        Ok(page(rows, limit, offset))
    }

    async fn cache_delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.write().await.cache.remove(key).is_some())
    }

    async fn cache_purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let before = state.cache.len();
        state.cache.retain(|_, row| row.expires_at > now);
        Ok((before - state.cache.len()) as u64)
    }

    async fn insert_identity(&self, record: &IdentityRecord) -> Result<String, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.identities.get(&record.pubkey) {
            return Ok(existing.actor_url.clone());
        }
        if state.identities.values().any(|r| r.actor_url == record.actor_url) {
            return Err(StoreError::Integrity(format!(
                "actor '{}' is already mapped to another key",
                record.actor_url
            )));
        }
        state.identities.insert(record.pubkey.clone(), record.clone());
        Ok(record.actor_url.clone())
    }

    async fn actor_url_for(&self, pubkey: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state.identities.get(pubkey).map(|r| r.actor_url.clone()))
    }

    async fn add_follower(&self, pubkey: &str, actor_url: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        let followers = state.followers.entry(pubkey.to_owned()).or_default();
        if !followers.iter().any(|f| f == actor_url) {
            followers.push(actor_url.to_owned());
        }
        Ok(())
    }

    async fn remove_follower(&self, pubkey: &str, actor_url: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let Some(followers) = state.followers.get_mut(pubkey) else {
            return Ok(false);
        };
        let before = followers.len();
        followers.retain(|f| f != actor_url);
        Ok(followers.len() < before)
    }

    async fn remove_follower_everywhere(&self, actor_url: &str) -> Result<u64, StoreError> {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for followers in state.followers.values_mut() {
            let before = followers.len();
            followers.retain(|f| f != actor_url);
            removed += (before - followers.len()) as u64;
        }
        Ok(removed)
    }

    async fn followers_of(&self, pubkey: &str) -> Result<Vec<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state.followers.get(pubkey).cloned().unwrap_or_default())
    }

    async fn insert_note_mapping(&self, mapping: &NoteMapping) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.note_to_event.contains_key(&mapping.note_url)
            || state.event_to_note.contains_key(&mapping.event_id)
        {
            return Ok(());
        }
        state.note_to_event.insert(mapping.note_url.clone(), mapping.clone());
        state.event_to_note.insert(mapping.event_id.clone(), mapping.note_url.clone());
        Ok(())
    }

    async fn note_mapping(&self, note_url: &str) -> Result<Option<NoteMapping>, StoreError> {
        Ok(self.state.read().await.note_to_event.get(note_url).cloned())
    }

    async fn event_id_for_note(&self, note_url: &str) -> Result<Option<String>, StoreError> {
        let state = self.state.read().await;
        Ok(state.note_to_event.get(note_url).map(|m| m.event_id.clone()))
    }

    async fn note_url_for_event(&self, event_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.read().await.event_to_note.get(event_id).cloned())
    }

    async fn upsert_actor_shadow(&self, shadow: &ActorShadow) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let stale = state
            .actors
            .get(&shadow.pubkey)
            .is_some_and(|existing| existing.created_at >= shadow.created_at);
        if stale {
            return Ok(false);
        }
        state.actors.insert(shadow.pubkey.clone(), shadow.clone());
        Ok(true)
    }

    async fn actor_shadow(&self, pubkey: &str) -> Result<Option<ActorShadow>, StoreError> {
        Ok(self.state.read().await.actors.get(pubkey).cloned())
    }

    async fn insert_note_shadow(&self, note: &NoteShadow) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.notes.entry(note.id.clone()).or_insert_with(|| note.clone());
        Ok(())
    }

    async fn note_shadow(&self, id: &str) -> Result<Option<NoteShadow>, StoreError> {
        Ok(self.state.read().await.notes.get(id).cloned())
    }

    async fn note_shadows_by(
        &self,
        pubkey: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NoteShadow>, StoreError> {
        let state = self.state.read().await;
        let mut notes: Vec<NoteShadow> =
            state.notes.values().filter(|n| n.pubkey == pubkey).cloned().collect();
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(page(notes, limit, offset))
    }

    async fn count_note_shadows_by(&self, pubkey: &str) -> Result<i64, StoreError> {
        let state = self.state.read().await;
        Ok(state.notes.values().filter(|n| n.pubkey == pubkey).count() as i64)
    }

    async fn delete_note_shadow(&self, id: &str, pubkey: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        if state.notes.get(id).is_some_and(|n| n.pubkey == pubkey) {
            state.notes.remove(id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn active_server_key(&self) -> Result<Option<ServerKeyRecord>, StoreError> {
        Ok(self.state.read().await.server_keys.last().cloned())
    }

    async fn insert_server_key(&self, record: &ServerKeyRecord) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if !state.server_keys.iter().any(|k| k.key_id == record.key_id) {
            state.server_keys.push(record.clone());
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn page<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(key: &str, created_at: i64, expires_in: Duration) -> CacheRow {
        CacheRow {
            key: key.into(),
            kind: 0,
            pubkey: "pk".into(),
            value: format!("v{created_at}"),
            created_at,
            expires_at: Utc::now() + expires_in,
        }
    }

    fn mapping(note_url: &str, event_id: &str) -> NoteMapping {
        NoteMapping {
            note_url: note_url.into(),
            event_id: event_id.into(),
            raw_event: format!("raw-{event_id}"),
        }
    }

    #[tokio::test]
    async fn replaceable_put_keeps_newest() {
        let store = MemoryStore::new();
        assert!(store.cache_put_replaceable(&row("0:pk", 100, Duration::days(1))).await.unwrap());
        assert!(!store.cache_put_replaceable(&row("0:pk", 50, Duration::days(1))).await.unwrap());
        assert!(!store.cache_put_replaceable(&row("0:pk", 100, Duration::days(1))).await.unwrap());
        assert!(store.cache_put_replaceable(&row("0:pk", 150, Duration::days(1))).await.unwrap());

        let stored = store.cache_get("0:pk", Utc::now()).await.unwrap().unwrap();
        assert_eq!(stored.created_at, 150);
    }

    #[tokio::test]
    async fn expired_replaceable_row_does_not_block_a_refresh() {
        let store = MemoryStore::new();
        assert!(store.cache_put_replaceable(&row("0:pk", 100, Duration::seconds(-1))).await.unwrap());
        assert!(store.cache_get("0:pk", Utc::now()).await.unwrap().is_none());

        assert!(store.cache_put_replaceable(&row("0:pk", 100, Duration::days(1))).await.unwrap());
        let stored = store.cache_get("0:pk", Utc::now()).await.unwrap().unwrap();
        assert_eq!(stored.created_at, 100);
    }

    #[tokio::test]
    async fn expired_rows_are_invisible_then_purged() {
        let store = MemoryStore::new();
        store.cache_put_appendable(&row("1:a", 1, Duration::seconds(-1))).await.unwrap();
        store.cache_put_appendable(&row("1:b", 1, Duration::days(1))).await.unwrap();

        assert!(store.cache_get("1:a", Utc::now()).await.unwrap().is_none());
        assert_eq!(store.cache_purge_expired(Utc::now()).await.unwrap(), 1);
        assert_eq!(store.cache_len().await, 1);
    }

    #[tokio::test]
    async fn identity_insert_is_idempotent_and_guards_actor_url() {
        let store = MemoryStore::new();
        let record = IdentityRecord {
            pubkey: "pk1".into(),
            actor_url: "https://m.example/u/a".into(),
            privkey: "sk1".into(),
        };
        assert_eq!(store.insert_identity(&record).await.unwrap(), record.actor_url);
        assert_eq!(store.insert_identity(&record).await.unwrap(), record.actor_url);

        let clash = IdentityRecord { pubkey: "pk2".into(), ..record.clone() };
        assert!(matches!(store.insert_identity(&clash).await, Err(StoreError::Integrity(_))));
        assert_eq!(store.actor_url_for("pk1").await.unwrap(), Some(record.actor_url));
    }

    #[tokio::test]
    async fn note_mapping_never_remaps() {
        let store = MemoryStore::new();
        store.insert_note_mapping(&mapping("https://n/1", "e1")).await.unwrap();
        store.insert_note_mapping(&mapping("https://n/1", "e2")).await.unwrap();
        store.insert_note_mapping(&mapping("https://n/2", "e1")).await.unwrap();

        assert_eq!(store.event_id_for_note("https://n/1").await.unwrap().as_deref(), Some("e1"));
        assert_eq!(store.note_url_for_event("e1").await.unwrap().as_deref(), Some("https://n/1"));
        assert_eq!(store.note_mapping_len().await, 1);
        let kept = store.note_mapping("https://n/1").await.unwrap().unwrap();
        assert_eq!(kept.raw_event, "raw-e1");
    }

    #[tokio::test]
    async fn followers_round_trip() {
        let store = MemoryStore::new();
        store.add_follower("pk", "https://a").await.unwrap();
        store.add_follower("pk", "https://a").await.unwrap();
        store.add_follower("pk", "https://b").await.unwrap();
        store.add_follower("other", "https://a").await.unwrap();
        assert_eq!(store.followers_of("pk").await.unwrap(), vec!["https://a", "https://b"]);

        assert!(store.remove_follower("pk", "https://b").await.unwrap());
        assert_eq!(store.remove_follower_everywhere("https://a").await.unwrap(), 2);
        assert!(store.followers_of("pk").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn note_shadow_delete_checks_author() {
        let store = MemoryStore::new();
        let note = NoteShadow {
            id: "n1".into(),
            pubkey: "pk".into(),
            created_at: 1,
            content: "hi".into(),
            raw_event: "{}".into(),
        };
        store.insert_note_shadow(&note).await.unwrap();
        assert!(!store.delete_note_shadow("n1", "intruder").await.unwrap());
        assert!(store.delete_note_shadow("n1", "pk").await.unwrap());
        assert!(store.note_shadow("n1").await.unwrap().is_none());
    }
}
