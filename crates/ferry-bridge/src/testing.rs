//! Fakes for the remote seams and a fully wired in-memory bridge.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use ferry_common::AppConfig;
use ferry_db::MemoryStore;
use ferry_nostr::{PeerPool, PeerPoolConfig, testing::StaticConnector};
use ferry_pub::{Actor, Delivery, Note, PubClient, PubError, RemoteCollection, ServerKeyPair};
use serde_json::Value;

use crate::service::{Bridge, BridgeDeps};

pub const SERVICE_URL: &str = "https://ferry.test";
pub const RELAY_URL: &str = "wss://ferry.test/relay";

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── ActivityPub reads ───────────────────────────────────────────────────────

/// Serves registered documents by URL and records every fetch.
#[derive(Default)]
pub struct FakePubClient {
    actors: Mutex<HashMap<String, Actor>>,
    notes: Mutex<HashMap<String, Note>>,
    collections: Mutex<HashMap<String, Value>>,
    accounts: Mutex<HashMap<String, String>>,
    fetched: Mutex<Vec<String>>,
}

impl FakePubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_actor(&self, actor: Actor) {
        lock(&self.actors).insert(actor.id.clone(), actor);
    }

    pub fn add_note(&self, note: Note) {
        lock(&self.notes).insert(note.id.clone(), note);
    }

    pub fn add_collection(&self, url: &str, collection: Value) {
        lock(&self.collections).insert(url.to_owned(), collection);
    }

    /// Make `user@domain` resolve to `actor_url` through WebFinger.
    pub fn add_account(&self, account: &str, actor_url: &str) {
        lock(&self.accounts).insert(account.to_owned(), actor_url.to_owned());
    }

    /// URLs fetched so far, in order.
    pub fn fetched(&self) -> Vec<String> {
        lock(&self.fetched).clone()
    }

    fn record(&self, url: &str) {
        lock(&self.fetched).push(url.to_owned());
    }
}

fn missing(url: &str) -> PubError {
    PubError::RemoteHttp(url.to_owned(), "404 Not Found".into())
}

#[async_trait]
impl PubClient for FakePubClient {
    async fn fetch_actor(&self, url: &str) -> Result<Actor, PubError> {
        self.record(url);
        lock(&self.actors).get(url).cloned().ok_or_else(|| missing(url))
    }

    async fn fetch_note(&self, url: &str) -> Result<Note, PubError> {
        self.record(url);
        lock(&self.notes).get(url).cloned().ok_or_else(|| missing(url))
    }

    async fn fetch_collection(&self, url: &str) -> Result<RemoteCollection, PubError> {
        self.record(url);
        let value = lock(&self.collections).get(url).cloned().ok_or_else(|| missing(url))?;
        Ok(RemoteCollection::from_value(&value)?)
    }

    async fn resolve_webfinger(&self, account: &str) -> Result<String, PubError> {
        lock(&self.accounts).get(account).cloned().ok_or_else(|| missing(account))
    }
}

// ─── Deliveries ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sent {
    pub key_id: String,
    pub inbox: String,
    pub activity: Value,
}

/// Records deliveries instead of sending them; selected inboxes fail.
#[derive(Default)]
pub struct RecordingDelivery {
    sent: Mutex<Vec<Sent>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, inbox: &str) {
        lock(&self.failing).insert(inbox.to_owned());
    }

    pub fn sent(&self) -> Vec<Sent> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Delivery for RecordingDelivery {
    async fn deliver(&self, key_id: &str, inbox: &str, activity: &Value) -> Result<(), PubError> {
        if lock(&self.failing).contains(inbox) {
            return Err(PubError::Delivery {
                inbox: inbox.to_owned(),
                status: 503,
                body: "unavailable".into(),
            });
        }
        lock(&self.sent).push(Sent {
            key_id: key_id.to_owned(),
            inbox: inbox.to_owned(),
            activity: activity.clone(),
        });
        Ok(())
    }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A bridge over [`MemoryStore`] with every remote seam faked.
pub struct Harness {
    pub bridge: Arc<Bridge>,
    pub store: Arc<MemoryStore>,
    pub client: Arc<FakePubClient>,
    pub delivery: Arc<RecordingDelivery>,
    pub connector: Arc<StaticConnector>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_peers(StaticConnector::new(), Vec::new())
    }

    /// Peers are consulted in the order given.
    pub fn with_peers(connector: StaticConnector, peers: Vec<String>) -> Self {
        let mut config = AppConfig::from_defaults().expect("built-in defaults deserialize");
        config.server.service_url = SERVICE_URL.into();
        config.server.relay_url = RELAY_URL.into();
        config.bridge.secret = Some(hex::encode(b"ferry-test-secret"));

        let store = Arc::new(MemoryStore::new());
        let client = Arc::new(FakePubClient::new());
        let delivery = Arc::new(RecordingDelivery::new());
        let connector = Arc::new(connector);
        let peers = Arc::new(PeerPool::from_ordered(
            peers,
            connector.clone(),
            PeerPoolConfig::default(),
        ));
        let server_key =
            Arc::new(ServerKeyPair::from_seed(&[7u8; 32]).expect("32-byte seed is valid"));

        let bridge = Bridge::new(
            &config,
            BridgeDeps {
                store: store.clone(),
                peers,
                client: client.clone(),
                delivery: delivery.clone(),
                server_key,
            },
        )
        .expect("test configuration is valid");

        Self { bridge: Arc::new(bridge), store, client, delivery, connector }
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// A remote actor with inbox, outbox and following collections.
pub fn remote_actor(url: &str, username: &str) -> Actor {
    Actor {
        id: url.to_owned(),
        kind: "Person".into(),
        name: Some(username.to_uppercase()),
        preferred_username: Some(username.to_owned()),
        inbox: Some(format!("{url}/inbox")),
        outbox: Some(format!("{url}/outbox")),
        following: Some(format!("{url}/following")),
        followers: Some(format!("{url}/followers")),
        published: Some("2023-01-02T03:04:05Z".into()),
        ..Actor::default()
    }
}

/// A public Note.
pub fn remote_note(id: &str, author: &str, content: &str) -> Note {
    Note {
        id: id.to_owned(),
        kind: "Note".into(),
        attributed_to: author.to_owned(),
        content: content.to_owned(),
        published: Some("2024-05-06T07:08:09Z".into()),
        to: vec![ferry_pub::types::PUBLIC.to_owned()],
        ..Note::default()
    }
}

/// Let detached tasks (cache puts, deliveries) run to completion.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
