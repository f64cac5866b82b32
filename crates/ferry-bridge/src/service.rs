//! The bridge context object and the read side of the ActivityPub surface.
//!
//! [`Bridge::new`] wires every component from the loaded [`AppConfig`] and
//! the remote seams handed in by the binary (or by tests).

use std::{collections::HashSet, sync::Arc};

use ferry_common::AppConfig;
use ferry_db::BridgeStore;
use ferry_nostr::{Event, Filter, PeerPool, keys::is_hex32, kind};
use ferry_pub::{
    Actor, Delivery, Note, PubClient, ServerKeyPair,
    types::{ACTIVITY_JSON, Activity, WebFinger, WebFingerLink, default_context},
};
use serde_json::{Value, json};
use tracing::{debug, error};

use crate::{
    adapter::BridgeStorage,
    cache::EventCache,
    dispatch::Dispatcher,
    error::BridgeError,
    identity::IdentityMapper,
    inbox::{InboxHandler, InboxOutcome},
    pagination::{ordered_collection, ordered_collection_page},
    settings::BridgeSettings,
    translate::Translator,
};

/// Peer results compared when looking up a replaceable event.
const REPLACEABLE_CANDIDATES: usize = 4;

/// Remote seams and shared resources the bridge is built on.
pub struct BridgeDeps {
    pub store: Arc<dyn BridgeStore>,
    pub peers: Arc<PeerPool>,
    pub client: Arc<dyn PubClient>,
    pub delivery: Arc<dyn Delivery>,
    pub server_key: Arc<ServerKeyPair>,
}

pub struct Bridge {
    pub settings: Arc<BridgeSettings>,
    pub store: Arc<dyn BridgeStore>,
    pub identity: Arc<IdentityMapper>,
    pub cache: EventCache,
    pub peers: Arc<PeerPool>,
    pub translator: Arc<Translator>,
    pub dispatcher: Arc<Dispatcher>,
    pub storage: Arc<BridgeStorage>,
    pub inbox: InboxHandler,
    client: Arc<dyn PubClient>,
}

impl Bridge {
    pub fn new(config: &AppConfig, deps: BridgeDeps) -> Result<Self, BridgeError> {
        let BridgeDeps { store, peers, client, delivery, server_key } = deps;

        let secret = match config.bridge.secret.as_deref() {
            Some(secret) => hex::decode(secret)
                .map_err(|e| BridgeError::validation(format!("bridge.secret is not hex: {e}")))?,
            None => server_key.seed_bytes().to_vec(),
        };

        let settings = Arc::new(BridgeSettings::from_config(config, server_key.public_key_pem()));
        let identity = Arc::new(IdentityMapper::new(secret, store.clone()));
        let cache = EventCache::new(store.clone(), settings.cache_ttl);
        let translator = Arc::new(Translator::new(
            settings.clone(),
            identity.clone(),
            cache.clone(),
            store.clone(),
            client.clone(),
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            settings.clone(),
            store.clone(),
            translator.clone(),
            client.clone(),
            delivery,
        ));
        let storage = Arc::new(BridgeStorage::new(
            settings.clone(),
            store.clone(),
            cache.clone(),
            identity.clone(),
            translator.clone(),
            dispatcher.clone(),
            client.clone(),
        ));
        let inbox = InboxHandler::new(
            store.clone(),
            identity.clone(),
            translator.clone(),
            dispatcher.clone(),
            client.clone(),
        );

        Ok(Self {
            settings,
            store,
            identity,
            cache,
            peers,
            translator,
            dispatcher,
            storage,
            inbox,
            client,
        })
    }

    pub async fn handle_inbox(&self, body: &Value) -> Result<InboxOutcome, BridgeError> {
        self.inbox.handle(body).await
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await
    }

    // ── Documents ───────────────────────────────────────────────────────────

    pub async fn actor_document(&self, pubkey: &str) -> Result<Actor, BridgeError> {
        require_hex32(pubkey, "actor")?;
        let profile = self
            .profile_event(pubkey)
            .await
            .ok_or_else(|| BridgeError::not_found(format!("actor {pubkey}")))?;
        self.translator.actor_from_profile(&profile)
    }

    pub async fn note_document(&self, id: &str) -> Result<Note, BridgeError> {
        require_hex32(id, "note")?;
        let event = self
            .note_event(id)
            .await
            .ok_or_else(|| BridgeError::not_found(format!("note {id}")))?;
        let mut note = self.translator.note_from_event(&event).await;
        note.context = Some(default_context());
        Ok(note)
    }

    // ── Collections ─────────────────────────────────────────────────────────

    /// `paged` serves the page on its own instead of the wrapping collection.
    pub async fn followers(&self, pubkey: &str, paged: bool) -> Result<Value, BridgeError> {
        require_hex32(pubkey, "actor")?;
        let followers = self.store.followers_of(pubkey).await?;
        collection_value(&self.settings.followers_url(pubkey), followers, paged)
    }

    pub async fn following(&self, pubkey: &str, paged: bool) -> Result<Value, BridgeError> {
        require_hex32(pubkey, "actor")?;
        let mut following = Vec::new();
        if let Some(contacts) = self.contacts_event(pubkey).await {
            for followed in contacts.mentioned_pubkeys() {
                let url = self.translator.actor_url_for(followed).await;
                if !following.contains(&url) {
                    following.push(url);
                }
            }
        }
        collection_value(&self.settings.following_url(pubkey), following, paged)
    }

    /// The newest notes of `pubkey` wrapped in `Create` activities.
    pub async fn outbox(&self, pubkey: &str, paged: bool) -> Result<Value, BridgeError> {
        require_hex32(pubkey, "actor")?;
        let page_size = self.settings.outbox_page_size;

        let mut events: Vec<Event> = self
            .store
            .note_shadows_by(pubkey, i64::try_from(page_size).unwrap_or(i64::MAX), 0)
            .await?
            .iter()
            .filter_map(|shadow| serde_json::from_str(&shadow.raw_event).ok())
            .collect();
        events.extend(self.cache.list_notes(pubkey, page_size, 0).await);
        if events.len() < page_size {
            let filter = Filter::new().author(pubkey).kind(kind::TEXT_NOTE).limit(page_size);
            for event in self.peers.query(&filter, page_size).await {
                self.cache.spawn_put(event.clone());
                events.push(event);
            }
        }

        let mut seen = HashSet::new();
        events.retain(|event| seen.insert(event.id.clone()));
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(page_size);

        let mut items = Vec::with_capacity(events.len());
        for event in &events {
            let note = self.translator.note_from_event(event).await;
            let create = Activity::create(self.settings.create_url(&event.id), &note)
                .map_err(|e| BridgeError::Internal(e.into()))?;
            let mut create =
                serde_json::to_value(create).map_err(|e| BridgeError::Internal(e.into()))?;
            if let Some(obj) = create.as_object_mut() {
                obj.remove("@context");
            }
            items.push(create);
        }

        let total = self.store.count_note_shadows_by(pubkey).await?;
        let total = usize::try_from(total).unwrap_or_default().max(items.len());
        let outbox_url = self.settings.outbox_url(pubkey);
        let value = if paged {
            let mut page = ordered_collection_page(&outbox_url, items);
            page.total_items = total;
            serde_json::to_value(page)
        } else {
            let mut collection = ordered_collection(&outbox_url, items);
            collection.total_items = total;
            collection.first.total_items = total;
            serde_json::to_value(collection)
        };
        value.map_err(|e| BridgeError::Internal(e.into()))
    }

    // ── Discovery ───────────────────────────────────────────────────────────

    /// WebFinger for `acct:{pubkey}@{service host}`.
    pub fn webfinger(&self, resource: &str) -> Result<WebFinger, BridgeError> {
        let account = resource.strip_prefix("acct:").unwrap_or(resource);
        let (user, host) = account
            .split_once('@')
            .ok_or_else(|| BridgeError::validation(format!("unsupported resource '{resource}'")))?;
        if host != self.settings.service_host || !is_hex32(user) {
            return Err(BridgeError::not_found(format!("account {account}")));
        }
        Ok(WebFinger {
            subject: format!("acct:{account}"),
            aliases: vec![self.settings.actor_url(user)],
            links: vec![WebFingerLink {
                rel: "self".into(),
                kind: Some(ACTIVITY_JSON.into()),
                href: Some(self.settings.actor_url(user)),
            }],
        })
    }

    /// NIP-05 document for `name = {user}_at_{domain}`: the derived pubkey
    /// of the ActivityPub account `user@domain`.
    pub async fn nip05(&self, name: &str) -> Result<Value, BridgeError> {
        if name.is_empty() {
            return Err(BridgeError::validation("missing the ?name= query value"));
        }
        let mut names = serde_json::Map::new();
        let mut relays = serde_json::Map::new();

        if let Some((user, domain)) = name.split_once("_at_") {
            match self.client.resolve_webfinger(&format!("{user}@{domain}")).await {
                Ok(actor_url) => {
                    let pubkey = self.identity.identity_for(&actor_url).await.public_hex();
                    names.insert(name.to_owned(), Value::String(pubkey.clone()));
                    relays.insert(pubkey, json!([self.settings.relay_url]));
                }
                Err(e) => debug!("NIP-05 lookup of {}@{} failed: {}", user, domain, e),
            }
        }
        Ok(json!({ "names": names, "relays": relays }))
    }

    // ── Event lookup: local, cache, then peers ──────────────────────────────

    async fn profile_event(&self, pubkey: &str) -> Option<Event> {
        match self.store.actor_shadow(pubkey).await {
            Ok(Some(shadow)) => {
                if let Ok(event) = serde_json::from_str(&shadow.raw_event) {
                    return Some(event);
                }
            }
            Ok(None) => {}
            Err(e) => error!("Actor shadow lookup for {} failed: {}", pubkey, e),
        }
        if let Some(event) = self.cache.profile(pubkey).await {
            return Some(event);
        }
        let filter = Filter::new().author(pubkey).kind(kind::METADATA).limit(1);
        self.from_peers(&filter, REPLACEABLE_CANDIDATES).await
    }

    async fn contacts_event(&self, pubkey: &str) -> Option<Event> {
        if let Some(event) = self.cache.contacts(pubkey).await {
            return Some(event);
        }
        let filter = Filter::new().author(pubkey).kind(kind::CONTACTS).limit(1);
        self.from_peers(&filter, REPLACEABLE_CANDIDATES).await
    }

    async fn note_event(&self, id: &str) -> Option<Event> {
        match self.store.note_shadow(id).await {
            Ok(Some(shadow)) => {
                if let Ok(event) = serde_json::from_str(&shadow.raw_event) {
                    return Some(event);
                }
            }
            Ok(None) => {}
            Err(e) => error!("Note shadow lookup for {} failed: {}", id, e),
        }
        if let Some(event) = self.cache.note(id).await {
            return Some(event);
        }
        let filter = Filter::new().id(id).kind(kind::TEXT_NOTE).limit(1);
        self.from_peers(&filter, 1).await
    }

    /// Newest of up to `candidates` matching events held by peers.
    async fn from_peers(&self, filter: &Filter, candidates: usize) -> Option<Event> {
        let event = self
            .peers
            .query(filter, candidates)
            .await
            .into_iter()
            .max_by_key(|event| event.created_at)?;
        self.cache.spawn_put(event.clone());
        Some(event)
    }
}

fn require_hex32(value: &str, what: &str) -> Result<(), BridgeError> {
    if is_hex32(value) {
        Ok(())
    } else {
        Err(BridgeError::not_found(format!("{what} {value}")))
    }
}

fn collection_value(id: &str, items: Vec<String>, paged: bool) -> Result<Value, BridgeError> {
    let value = if paged {
        serde_json::to_value(ordered_collection_page(id, items))
    } else {
        serde_json::to_value(ordered_collection(id, items))
    };
    value.map_err(|e| BridgeError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::RelayStorage;
    use crate::testing::{Harness, RELAY_URL, SERVICE_URL, settle};
    use ferry_nostr::{EventBuilder, Keys, testing::StaticConnector};

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[31u8; 32]).unwrap()
    }

    fn profile() -> Event {
        EventBuilder::new(kind::METADATA, 50, r#"{"name":"relay user"}"#).sign(&keys()).unwrap()
    }

    #[tokio::test]
    async fn newest_profile_across_peers_wins() {
        let newer =
            EventBuilder::new(kind::METADATA, 90, r#"{"name":"renamed"}"#).sign(&keys()).unwrap();
        let connector = StaticConnector::new()
            .with("wss://a", vec![profile()])
            .with("wss://b", vec![newer]);
        let h = Harness::with_peers(connector, vec!["wss://a".into(), "wss://b".into()]);

        let actor = h.bridge.actor_document(&keys().public_hex()).await.unwrap();
        assert_eq!(actor.name.as_deref(), Some("renamed"));
        assert_eq!(h.connector.calls(), 2);
    }

    #[tokio::test]
    async fn actor_is_fetched_from_peers_once() {
        let connector = StaticConnector::new().with("wss://a", vec![profile()]);
        let h = Harness::with_peers(connector, vec!["wss://a".into()]);
        let pubkey = keys().public_hex();

        let actor = h.bridge.actor_document(&pubkey).await.unwrap();
        assert_eq!(actor.name.as_deref(), Some("relay user"));
        assert_eq!(actor.id, format!("{SERVICE_URL}/actor/{pubkey}"));

        settle().await;
        h.bridge.actor_document(&pubkey).await.unwrap();
        assert_eq!(h.connector.calls(), 1);
    }

    #[tokio::test]
    async fn unknown_actor_is_not_found() {
        let h = Harness::new();
        assert!(matches!(
            h.bridge.actor_document(&"ab".repeat(32)).await,
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(h.bridge.actor_document("zz").await, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn followers_collection_and_page() {
        let h = Harness::new();
        let pubkey = keys().public_hex();
        h.store.add_follower(&pubkey, "https://m.example/users/alice").await.unwrap();

        let collection = h.bridge.followers(&pubkey, false).await.unwrap();
        assert_eq!(collection["type"], "OrderedCollection");
        assert_eq!(collection["totalItems"], 1);
        assert_eq!(collection["first"]["orderedItems"][0], "https://m.example/users/alice");

        let page = h.bridge.followers(&pubkey, true).await.unwrap();
        assert_eq!(page["type"], "OrderedCollectionPage");
        assert_eq!(page["partOf"], format!("{SERVICE_URL}/actor/{pubkey}/followers"));
    }

    #[tokio::test]
    async fn following_maps_contacts_to_actor_urls() {
        let h = Harness::new();
        let bob = "https://o.example/users/bob";
        let bob_pubkey = h.bridge.identity.identity_for(bob).await.public_hex();
        let plain = "cd".repeat(32);
        let contacts = EventBuilder::new(kind::CONTACTS, 5, "")
            .tag(["p", bob_pubkey.as_str(), RELAY_URL])
            .tag(["p", plain.as_str()])
            .sign(&keys())
            .unwrap();
        h.bridge.cache.put(&contacts).await.unwrap();

        let following = h.bridge.following(&keys().public_hex(), true).await.unwrap();
        assert_eq!(
            following["orderedItems"],
            json!([bob, format!("{SERVICE_URL}/actor/{plain}")])
        );
    }

    #[tokio::test]
    async fn outbox_wraps_notes_in_creates() {
        let h = Harness::new();
        for (ts, text) in [(1, "first"), (2, "second")] {
            let event = EventBuilder::new(kind::TEXT_NOTE, ts, text).sign(&keys()).unwrap();
            h.bridge.storage.save(&event).await.unwrap();
        }

        let outbox = h.bridge.outbox(&keys().public_hex(), false).await.unwrap();
        assert_eq!(outbox["totalItems"], 2);
        let items = outbox["first"]["orderedItems"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["type"], "Create");
        assert_eq!(items[0]["object"]["content"], "second");
        assert!(items[0].get("@context").is_none());
    }

    #[tokio::test]
    async fn saved_note_is_served_as_activitypub() {
        let h = Harness::new();
        let event = EventBuilder::new(kind::TEXT_NOTE, 7, "hello").sign(&keys()).unwrap();
        h.bridge.storage.save(&event).await.unwrap();

        let note = h.bridge.note_document(&event.id).await.unwrap();
        assert_eq!(note.id, format!("{SERVICE_URL}/note/{}", event.id));
        assert_eq!(note.attributed_to, format!("{SERVICE_URL}/actor/{}", event.pubkey));
        assert_eq!(note.published.as_deref(), Some("1970-01-01T00:00:07Z"));
        assert!(note.context.is_some());
    }

    #[tokio::test]
    async fn webfinger_only_answers_for_local_handles() {
        let h = Harness::new();
        let pubkey = keys().public_hex();

        let doc = h.bridge.webfinger(&format!("acct:{pubkey}@ferry.test")).unwrap();
        assert_eq!(doc.actor_url(), Some(format!("{SERVICE_URL}/actor/{pubkey}").as_str()));

        assert!(matches!(
            h.bridge.webfinger(&format!("acct:{pubkey}@elsewhere.example")),
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(h.bridge.webfinger("acct:nobody"), Err(BridgeError::Validation(_))));
    }

    #[tokio::test]
    async fn nip05_resolves_activitypub_accounts() {
        let h = Harness::new();
        let alice = "https://m.example/users/alice";
        h.client.add_account("alice@m.example", alice);

        let doc = h.bridge.nip05("alice_at_m.example").await.unwrap();
        let pubkey = h.bridge.identity.derive_keypair(alice).public_hex();
        assert_eq!(doc["names"]["alice_at_m.example"], pubkey.as_str());
        assert_eq!(doc["relays"][pubkey.as_str()], json!([RELAY_URL]));

        let unknown = h.bridge.nip05("bob_at_nowhere.example").await.unwrap();
        assert_eq!(unknown["names"], json!({}));
        assert!(matches!(h.bridge.nip05("").await, Err(BridgeError::Validation(_))));
    }
}
