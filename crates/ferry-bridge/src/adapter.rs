//! The storage contract a Nostr relay host delegates to.
//!
//! The relay endpoint never touches the store directly: admission, writes,
//! reads and deletions all go through [`RelayStorage`]. [`BridgeStorage`]
//! answers reads from local shadows and the cache first, and falls back to
//! translating from ActivityPub for identities the bridge derived.

use std::{collections::HashSet, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use ferry_db::{ActorShadow, BridgeStore, NoteShadow};
use ferry_nostr::{Event, Filter, kind, keys::is_hex32};
use ferry_pub::PubClient;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    cache::{CacheKey, EventCache},
    dispatch::Dispatcher,
    error::BridgeError,
    identity::IdentityMapper,
    settings::BridgeSettings,
    translate::{ProfileMetadata, Translator},
};

/// Results returned when a filter carries no limit.
pub const DEFAULT_QUERY_LIMIT: usize = 100;
const MAX_QUERY_LIMIT: usize = 500;

#[async_trait]
pub trait RelayStorage: Send + Sync {
    async fn init(&self) -> Result<(), BridgeError>;

    /// Admission check run before `save`.
    fn accept(&self, event: &Event) -> bool;

    async fn save(&self, event: &Event) -> Result<(), BridgeError>;

    async fn query(&self, filter: &Filter) -> Result<Vec<Event>, BridgeError>;

    /// Remove a locally stored note, only if `pubkey` authored it.
    async fn delete(&self, id: &str, pubkey: &str) -> Result<(), BridgeError>;
}

pub struct BridgeStorage {
    settings: Arc<BridgeSettings>,
    store: Arc<dyn BridgeStore>,
    cache: EventCache,
    identity: Arc<IdentityMapper>,
    translator: Arc<Translator>,
    dispatcher: Arc<Dispatcher>,
    client: Arc<dyn PubClient>,
}

impl BridgeStorage {
    pub fn new(
        settings: Arc<BridgeSettings>,
        store: Arc<dyn BridgeStore>,
        cache: EventCache,
        identity: Arc<IdentityMapper>,
        translator: Arc<Translator>,
        dispatcher: Arc<Dispatcher>,
        client: Arc<dyn PubClient>,
    ) -> Self {
        Self { settings, store, cache, identity, translator, dispatcher, client }
    }

    async fn save_profile(&self, event: &Event) -> Result<(), BridgeError> {
        let metadata = ProfileMetadata::parse(&event.content)?;
        let raw_event = serde_json::to_string(event).map_err(|e| BridgeError::Internal(e.into()))?;
        let written = self
            .store
            .upsert_actor_shadow(&ActorShadow {
                pubkey: event.pubkey.clone(),
                created_at: event.created_at,
                name: metadata.name.unwrap_or_default(),
                about: metadata.about.unwrap_or_default(),
                picture: metadata.picture.unwrap_or_default(),
                raw_event,
            })
            .await?;
        if !written {
            debug!("Profile {} is older than the one on file", event.id);
        }
        self.cache.spawn_put(event.clone());
        Ok(())
    }

    async fn save_note(&self, event: &Event) -> Result<(), BridgeError> {
        let raw_event = serde_json::to_string(event).map_err(|e| BridgeError::Internal(e.into()))?;
        self.store
            .insert_note_shadow(&NoteShadow {
                id: event.id.clone(),
                pubkey: event.pubkey.clone(),
                created_at: event.created_at,
                content: event.content.clone(),
                raw_event,
            })
            .await?;
        self.cache.spawn_put(event.clone());
        self.dispatcher.spawn_create(event.clone());
        Ok(())
    }

    // ── Query sources ───────────────────────────────────────────────────────

    async fn event_by_id(&self, id: &str) -> Option<Event> {
        match self.store.note_shadow(id).await {
            Ok(Some(shadow)) => return decode_raw(&shadow.raw_event),
            Ok(None) => {}
            Err(e) => error!("Note shadow lookup for {} failed: {}", id, e),
        }
        if let Some(event) = self.cache.note(id).await {
            return Some(event);
        }
        let note_url = match self.store.note_url_for_event(id).await {
            Ok(url) => url?,
            Err(e) => {
                error!("Note mapping lookup for {} failed: {}", id, e);
                return None;
            }
        };
        self.translator.mapped_event(&note_url).await
    }

    async fn author_events(&self, author: &str, filter: &Filter, limit: usize) -> Vec<Event> {
        let mut events = Vec::new();
        let bridged = self.identity.resolve_actor_url(author).await;

        if filter.wants_kind(kind::METADATA) {
            if let Some(profile) = self.profile_of(author, bridged.as_deref()).await {
                events.push(profile);
            }
        }
        if filter.wants_kind(kind::CONTACTS) {
            if let Some(contacts) = self.contacts_of(author, bridged.as_deref()).await {
                events.push(contacts);
            }
        }
        if filter.wants_kind(kind::TEXT_NOTE) {
            events.extend(self.notes_of(author, bridged.as_deref(), limit).await);
        }
        events
    }

    async fn profile_of(&self, author: &str, bridged: Option<&str>) -> Option<Event> {
        match self.store.actor_shadow(author).await {
            Ok(Some(shadow)) => return decode_raw(&shadow.raw_event),
            Ok(None) => {}
            Err(e) => error!("Actor shadow lookup for {} failed: {}", author, e),
        }
        if let Some(event) = self.cache.profile(author).await {
            return Some(event);
        }
        let actor = self.client.fetch_actor(bridged?).await.ok()?;
        let event = self.translator.profile_from_actor(&actor).await.ok()?;
        self.cache.spawn_put(event.clone());
        Some(event)
    }

    async fn contacts_of(&self, author: &str, bridged: Option<&str>) -> Option<Event> {
        if let Some(event) = self.cache.contacts(author).await {
            return Some(event);
        }
        let actor = self.client.fetch_actor(bridged?).await.ok()?;
        let event = self.translator.contacts_from_following(&actor).await.ok()?;
        self.cache.spawn_put(event.clone());
        Some(event)
    }

    async fn notes_of(&self, author: &str, bridged: Option<&str>, limit: usize) -> Vec<Event> {
        let mut events: Vec<Event> = match self
            .store
            .note_shadows_by(author, i64::try_from(limit).unwrap_or(i64::MAX), 0)
            .await
        {
            Ok(shadows) => shadows.iter().filter_map(|s| decode_raw(&s.raw_event)).collect(),
            Err(e) => {
                error!("Note shadow listing for {} failed: {}", author, e);
                Vec::new()
            }
        };
        events.extend(self.cache.list_notes(author, limit, 0).await);

        let Some(actor_url) = bridged else {
            return events;
        };
        if events.len() >= limit {
            return events;
        }
        let outbox = match self.client.fetch_actor(actor_url).await {
            Ok(actor) => actor.outbox,
            Err(e) => {
                warn!("Could not fetch actor {}: {}", actor_url, e);
                None
            }
        };
        if let Some(outbox) = outbox {
            let entries = self.translator.collection_entries(&Value::String(outbox), limit).await;
            events.extend(self.translate_entries(&entries).await);
        }
        events
    }

    /// Events replying to `id`, read from the replies collection of the note
    /// it was translated from.
    async fn replies_to(&self, id: &str, limit: usize) -> Vec<Event> {
        let note_url = match self.store.note_url_for_event(id).await {
            Ok(Some(url)) => url,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!("Note mapping lookup for {} failed: {}", id, e);
                return Vec::new();
            }
        };
        let replies = match self.client.fetch_note(&note_url).await {
            Ok(note) => note.replies,
            Err(e) => {
                warn!("Could not fetch {}: {}", note_url, e);
                None
            }
        };
        let Some(replies) = replies else {
            return Vec::new();
        };
        let entries = self.translator.collection_entries(&replies, limit).await;
        self.translate_entries(&entries).await
    }

    async fn translate_entries(&self, entries: &[Value]) -> Vec<Event> {
        let mut events = Vec::new();
        for entry in entries {
            let Some(note) = self.translator.entry_note(entry).await else {
                continue;
            };
            match self.translator.event_from_note(&note).await {
                Ok(event) => events.push(event),
                Err(e) => debug!("Skipping {}: {}", note.id, e),
            }
        }
        events
    }
}

#[async_trait]
impl RelayStorage for BridgeStorage {
    async fn init(&self) -> Result<(), BridgeError> {
        if !self.store.health_check().await {
            return Err(BridgeError::Internal(anyhow!("store is unreachable")));
        }
        info!("Relay storage ready at {}", self.settings.relay_url);
        Ok(())
    }

    fn accept(&self, event: &Event) -> bool {
        let size = event.serialized_len();
        if size > self.settings.max_event_bytes {
            debug!("Rejecting {}: {} bytes", event.id, size);
            return false;
        }
        true
    }

    async fn save(&self, event: &Event) -> Result<(), BridgeError> {
        event
            .verify()
            .map_err(|e| BridgeError::validation(format!("invalid event: {e}")))?;

        match event.kind {
            kind::METADATA => self.save_profile(event).await,
            kind::TEXT_NOTE => self.save_note(event).await,
            kind::CONTACTS | kind::DELETION => {
                debug!("Kind {} event {} accepted without side effects", event.kind, event.id);
                Ok(())
            }
            other => {
                debug!("Ignoring event {} of kind {}", event.id, other);
                Ok(())
            }
        }
    }

    async fn query(&self, filter: &Filter) -> Result<Vec<Event>, BridgeError> {
        let limit = filter.limit.unwrap_or(DEFAULT_QUERY_LIMIT).min(MAX_QUERY_LIMIT);
        let mut candidates: Vec<Event> = Vec::new();

        for id in filter.ids.iter().flatten().filter(|id| is_hex32(id)) {
            candidates.extend(self.event_by_id(id).await);
        }
        for author in filter.authors.iter().flatten().filter(|a| is_hex32(a)) {
            candidates.extend(self.author_events(author, filter, limit).await);
        }
        for id in filter.tag_values("e").iter().filter(|id| is_hex32(id)) {
            candidates.extend(self.replies_to(id, limit).await);
        }

        let mut seen = HashSet::new();
        let mut events: Vec<Event> = candidates
            .into_iter()
            .filter(|event| filter.matches(event) && seen.insert(event.id.clone()))
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn delete(&self, id: &str, pubkey: &str) -> Result<(), BridgeError> {
        if self.store.delete_note_shadow(id, pubkey).await? {
            debug!("Deleted note {} by {}", id, pubkey);
        }
        if self.cache.note(id).await.is_some_and(|cached| cached.pubkey == pubkey) {
            self.cache.remove(&CacheKey::Appendable { id: id.to_owned() }).await?;
        }
        Ok(())
    }
}

fn decode_raw(raw: &str) -> Option<Event> {
    match serde_json::from_str(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            error!("Stored raw event is malformed: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, remote_actor, remote_note, settle};
    use ferry_nostr::{EventBuilder, Keys};
    use serde_json::json;

    const ALICE: &str = "https://m.example/users/alice";

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[11u8; 32]).unwrap()
    }

    fn note(created_at: i64, content: &str) -> Event {
        EventBuilder::new(kind::TEXT_NOTE, created_at, content).sign(&keys()).unwrap()
    }

    #[tokio::test]
    async fn oversized_events_are_refused() {
        let h = Harness::new();
        let storage = &h.bridge.storage;
        assert!(storage.accept(&note(1, "short")));
        assert!(!storage.accept(&note(1, &"x".repeat(10_001))));
    }

    #[tokio::test]
    async fn forged_events_are_not_saved() {
        let h = Harness::new();
        let mut event = note(1, "hello");
        event.content = "tampered".into();
        let err = h.bridge.storage.save(&event).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[tokio::test]
    async fn saved_profile_is_served() {
        let h = Harness::new();
        let profile = EventBuilder::new(kind::METADATA, 5, r#"{"name":"sam"}"#).sign(&keys()).unwrap();
        h.bridge.storage.save(&profile).await.unwrap();

        let shadow = h.store.actor_shadow(&profile.pubkey).await.unwrap().unwrap();
        assert_eq!(shadow.name, "sam");

        let filter = Filter::new().author(profile.pubkey.clone()).kind(kind::METADATA);
        assert_eq!(h.bridge.storage.query(&filter).await.unwrap(), vec![profile]);
    }

    #[tokio::test]
    async fn malformed_profile_is_refused() {
        let h = Harness::new();
        let profile = EventBuilder::new(kind::METADATA, 5, "{not json").sign(&keys()).unwrap();
        assert!(matches!(
            h.bridge.storage.save(&profile).await,
            Err(BridgeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn contact_and_deletion_events_are_no_ops() {
        let h = Harness::new();
        let contacts = EventBuilder::new(kind::CONTACTS, 1, "").tag(["p", "ab"]).sign(&keys()).unwrap();
        let deletion = EventBuilder::new(kind::DELETION, 1, "").tag(["e", "ab"]).sign(&keys()).unwrap();
        h.bridge.storage.save(&contacts).await.unwrap();
        h.bridge.storage.save(&deletion).await.unwrap();
        settle().await;
        assert_eq!(h.store.cache_len().await, 0);
    }

    #[tokio::test]
    async fn notes_are_listed_newest_first_and_limited() {
        let h = Harness::new();
        for (ts, text) in [(10, "a"), (30, "c"), (20, "b")] {
            h.bridge.storage.save(&note(ts, text)).await.unwrap();
        }
        settle().await;

        let filter = Filter::new().author(keys().public_hex()).kind(kind::TEXT_NOTE).limit(2);
        let found = h.bridge.storage.query(&filter).await.unwrap();
        let contents: Vec<&str> = found.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn delete_only_removes_own_notes() {
        let h = Harness::new();
        let event = note(1, "mine");
        h.bridge.storage.save(&event).await.unwrap();
        settle().await;
        let by_id = Filter::new().id(event.id.clone());

        h.bridge.storage.delete(&event.id, &"0".repeat(64)).await.unwrap();
        assert_eq!(h.bridge.storage.query(&by_id).await.unwrap().len(), 1);

        h.bridge.storage.delete(&event.id, &event.pubkey).await.unwrap();
        assert!(h.bridge.storage.query(&by_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bridged_author_is_translated_from_activitypub() {
        let h = Harness::new();
        let actor = remote_actor(ALICE, "alice");
        let outbox = actor.outbox.clone().unwrap();
        let post = remote_note("https://m.example/notes/1", ALICE, "<p>from the fediverse</p>");
        h.client.add_actor(actor);
        h.client.add_collection(
            &outbox,
            json!({
                "type": "OrderedCollection",
                "first": {
                    "type": "OrderedCollectionPage",
                    "orderedItems": [
                        { "type": "Create", "object": serde_json::to_value(&post).unwrap() },
                        { "type": "Announce", "object": "https://x.example/n/9" },
                    ],
                },
            }),
        );
        let pubkey = h.bridge.identity.identity_for(ALICE).await.public_hex();

        let filter = Filter::new().author(pubkey.clone()).kind(kind::METADATA).kind(kind::TEXT_NOTE);
        let found = h.bridge.storage.query(&filter).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].kind, kind::TEXT_NOTE);
        assert_eq!(found[0].content, "from the fediverse");
        assert_eq!(found[1].kind, kind::METADATA);
        assert!(found.iter().all(|e| e.pubkey == pubkey));
    }

    #[tokio::test]
    async fn replies_are_found_by_reference() {
        let h = Harness::new();
        let mut parent = remote_note("https://m.example/notes/p", ALICE, "parent");
        let mut reply = remote_note("https://o.example/notes/r", "https://o.example/u/bob", "reply");
        reply.in_reply_to = Some(parent.id.clone());
        parent.replies = Some(json!({
            "type": "Collection",
            "first": { "type": "CollectionPage", "items": [serde_json::to_value(&reply).unwrap()] },
        }));
        h.client.add_note(parent.clone());

        let parent_event = h.bridge.translator.event_from_note(&parent).await.unwrap();
        let filter = Filter::new().tag("e", parent_event.id.clone());
        let found = h.bridge.storage.query(&filter).await.unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "reply");
        assert_eq!(found[0].immediate_reply(), Some(parent_event.id.as_str()));
    }

    #[tokio::test]
    async fn unknown_ids_yield_nothing() {
        let h = Harness::new();
        let filter = Filter::new().id("ab".repeat(32));
        assert!(h.bridge.storage.query(&filter).await.unwrap().is_empty());
        h.bridge.storage.init().await.unwrap();
    }
}
