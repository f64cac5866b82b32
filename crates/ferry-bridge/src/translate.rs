//! Object translation between the two protocols.
//!
//! | ActivityPub            | Nostr                 |
//! |------------------------|-----------------------|
//! | Actor                  | kind 0 (metadata)     |
//! | Note                   | kind 1 (text note)    |
//! | `following` collection | kind 3 (contact list) |
//! | `inReplyTo`            | NIP-10 `e` tag        |
//! | `to` / `cc` actors     | `p` tags              |
//!
//! Events translated from ActivityPub are signed with the derived key of the
//! author, without auxiliary randomness. The signed event is stored with the
//! note mapping, and every later translation of the note returns it.

use std::{
    collections::HashSet,
    sync::{Arc, LazyLock},
};

use chrono::{DateTime, Utc};
use ferry_db::{BridgeStore, NoteMapping};
use ferry_nostr::{Event, EventBuilder, kind};
use ferry_pub::{
    Actor, Note, PubClient,
    types::{
        Image, PUBLIC, PageRef, PublicKey, RemoteCollection, default_context, id_ref,
        is_followers_collection, is_public,
    },
};
use futures_util::future::{BoxFuture, FutureExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{cache::EventCache, error::BridgeError, identity::IdentityMapper, settings::BridgeSettings};

/// Pages followed when walking a remote collection.
const MAX_COLLECTION_PAGES: usize = 5;
/// Accounts taken from a remote `following` collection.
const MAX_FOLLOWING: usize = 1000;

static BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</p>\s*").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Content of a kind-0 event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nip05: Option<String>,
}

impl ProfileMetadata {
    pub fn parse(content: &str) -> Result<Self, BridgeError> {
        serde_json::from_str(content)
            .map_err(|e| BridgeError::validation(format!("malformed profile metadata: {e}")))
    }
}

pub struct Translator {
    settings: Arc<BridgeSettings>,
    identity: Arc<IdentityMapper>,
    cache: EventCache,
    store: Arc<dyn BridgeStore>,
    client: Arc<dyn PubClient>,
}

impl Translator {
    pub fn new(
        settings: Arc<BridgeSettings>,
        identity: Arc<IdentityMapper>,
        cache: EventCache,
        store: Arc<dyn BridgeStore>,
        client: Arc<dyn PubClient>,
    ) -> Self {
        Self { settings, identity, cache, store, client }
    }

    // ── Note → kind 1 ───────────────────────────────────────────────────────

    /// Translate a Note, resolving its reply chain.
    pub async fn event_from_note(&self, note: &Note) -> Result<Event, BridgeError> {
        let mut visited = HashSet::new();
        self.translate_note(note, 0, &mut visited).await
    }

    fn translate_note<'a>(
        &'a self,
        note: &'a Note,
        depth: usize,
        visited: &'a mut HashSet<String>,
    ) -> BoxFuture<'a, Result<Event, BridgeError>> {
        async move {
            if note.attributed_to.is_empty() {
                return Err(BridgeError::validation(format!("note {} has no author", note.id)));
            }
            visited.insert(note.id.clone());

            if let Some(existing) = self.mapped_event(&note.id).await {
                return Ok(existing);
            }

            let keys = self.identity.identity_for(&note.attributed_to).await;
            let mut tags: Vec<Vec<String>> = Vec::new();

            if let Some(parent_url) = note.in_reply_to.as_deref() {
                if let Some(parent_id) = self.resolve_parent(parent_url, depth, visited).await {
                    tags.push(vec![
                        "e".into(),
                        parent_id,
                        self.settings.relay_url.clone(),
                        "reply".into(),
                    ]);
                }
            }

            let mut mentioned = HashSet::new();
            for recipient in note.recipients() {
                if is_public(recipient) || is_followers_collection(recipient) {
                    continue;
                }
                let pubkey = self.pubkey_for_actor(recipient).await;
                if mentioned.insert(pubkey.clone()) {
                    tags.push(vec!["p".into(), pubkey, self.settings.relay_url.clone()]);
                }
            }

            let created_at = note
                .published
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(|| Utc::now().timestamp());
            let event = EventBuilder::new(kind::TEXT_NOTE, created_at, strip_markup(&note.content))
                .tags(tags)
                .sign(&keys)?;

            let raw_event =
                serde_json::to_string(&event).map_err(|e| BridgeError::Internal(e.into()))?;
            let mapping =
                NoteMapping { note_url: note.id.clone(), event_id: event.id.clone(), raw_event };
            if let Err(e) = self.store.insert_note_mapping(&mapping).await {
                error!("Failed to record note mapping {} -> {}: {}", note.id, event.id, e);
            }
            // A concurrent translation of the same note may have landed first.
            if let Some(existing) = self.mapped_event(&note.id).await {
                if existing.id != event.id {
                    return Ok(existing);
                }
            }

            self.cache.spawn_put(event.clone());
            debug!("Translated note {} into event {}", note.id, event.id);
            Ok(event)
        }
        .boxed()
    }

    /// Event id of the parent, translating it first if it was never seen.
    async fn resolve_parent(
        &self,
        parent_url: &str,
        depth: usize,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        match self.store.event_id_for_note(parent_url).await {
            Ok(Some(id)) => return Some(id),
            Ok(None) => {}
            Err(e) => error!("Note mapping lookup for {} failed: {}", parent_url, e),
        }
        if depth >= self.settings.max_reply_depth {
            debug!("Reply chain cut at {} (depth {})", parent_url, depth);
            return None;
        }
        if !visited.insert(parent_url.to_owned()) {
            debug!("Reply cycle through {}", parent_url);
            return None;
        }

        let parent = match self.client.fetch_note(parent_url).await {
            Ok(parent) => parent,
            Err(e) => {
                warn!("Could not fetch parent note {}: {}", parent_url, e);
                return None;
            }
        };
        match self.translate_note(&parent, depth + 1, visited).await {
            Ok(event) => Some(event.id),
            Err(e) => {
                warn!("Could not translate parent note {}: {}", parent_url, e);
                None
            }
        }
    }

    /// The event a note was already translated into.
    pub async fn mapped_event(&self, note_url: &str) -> Option<Event> {
        let mapping = match self.store.note_mapping(note_url).await {
            Ok(mapping) => mapping?,
            Err(e) => {
                error!("Note mapping lookup for {} failed: {}", note_url, e);
                return None;
            }
        };
        match serde_json::from_str(&mapping.raw_event) {
            Ok(event) => Some(event),
            Err(e) => {
                error!("Stored event for {} is malformed: {}", note_url, e);
                None
            }
        }
    }

    /// Pubkey standing for an actor URL: the embedded one for our own actors,
    /// the derived (and recorded) one otherwise.
    pub async fn pubkey_for_actor(&self, actor_url: &str) -> String {
        match self.settings.local_pubkey(actor_url) {
            Some(pubkey) => pubkey.to_owned(),
            None => self.identity.identity_for(actor_url).await.public_hex(),
        }
    }

    // ── kind 1 → Note ───────────────────────────────────────────────────────

    pub async fn note_from_event(&self, event: &Event) -> Note {
        let id = self
            .note_url_for(&event.id)
            .await
            .unwrap_or_else(|| self.settings.note_url(&event.id));

        let mut cc: Vec<String> = Vec::new();
        for pubkey in event.mentioned_pubkeys() {
            let url = self.actor_url_for(pubkey).await;
            if !cc.contains(&url) {
                cc.push(url);
            }
        }

        let in_reply_to = match event.immediate_reply() {
            Some(parent) => Some(
                self.note_url_for(parent).await.unwrap_or_else(|| self.settings.note_url(parent)),
            ),
            None => None,
        };

        Note {
            context: None,
            id,
            kind: "Note".into(),
            attributed_to: self.actor_url_for(&event.pubkey).await,
            content: event.content.clone(),
            published: Some(format_timestamp(event.created_at)),
            in_reply_to,
            to: vec![PUBLIC.to_owned()],
            cc,
            url: None,
            replies: None,
        }
    }

    /// ActivityPub actor URL for a pubkey: the bridged actor if there is one,
    /// else our own actor document.
    pub async fn actor_url_for(&self, pubkey: &str) -> String {
        match self.identity.resolve_actor_url(pubkey).await {
            Some(url) => url,
            None => self.settings.actor_url(pubkey),
        }
    }

    async fn note_url_for(&self, event_id: &str) -> Option<String> {
        match self.store.note_url_for_event(event_id).await {
            Ok(url) => url,
            Err(e) => {
                error!("Note mapping lookup for event {} failed: {}", event_id, e);
                None
            }
        }
    }

    // ── Actor ⇄ kind 0 ──────────────────────────────────────────────────────

    pub async fn profile_from_actor(&self, actor: &Actor) -> Result<Event, BridgeError> {
        let keys = self.identity.identity_for(&actor.id).await;

        let username = actor.preferred_username.clone().filter(|u| !u.is_empty());
        let nip05 = username.as_ref().and_then(|user| {
            url::Url::parse(&actor.id)
                .ok()
                .and_then(|u| u.host_str().map(|host| format!("{user}@{host}")))
        });
        let metadata = ProfileMetadata {
            name: actor.name.clone().filter(|n| !n.is_empty()).or(username),
            about: actor.summary.as_deref().map(strip_markup),
            picture: actor.icon_url().map(str::to_owned),
            nip05,
        };
        let content = serde_json::to_string(&metadata).map_err(|e| BridgeError::Internal(e.into()))?;

        Ok(EventBuilder::new(kind::METADATA, actor_timestamp(actor), content).sign(&keys)?)
    }

    /// Person document for a Nostr profile.
    pub fn actor_from_profile(&self, event: &Event) -> Result<Actor, BridgeError> {
        if event.kind != kind::METADATA {
            return Err(BridgeError::validation(format!("event {} is not a profile", event.id)));
        }
        let metadata = ProfileMetadata::parse(&event.content)?;
        let pubkey = &event.pubkey;
        let actor_url = self.settings.actor_url(pubkey);

        Ok(Actor {
            context: Some(default_context()),
            id: actor_url.clone(),
            kind: "Person".into(),
            name: metadata.name,
            preferred_username: Some(pubkey.clone()),
            summary: metadata.about,
            icon: metadata.picture.map(Image::new),
            inbox: Some(self.settings.inbox_url()),
            outbox: Some(self.settings.outbox_url(pubkey)),
            followers: Some(self.settings.followers_url(pubkey)),
            following: Some(self.settings.following_url(pubkey)),
            url: Some(actor_url.clone()),
            published: Some(format_timestamp(event.created_at)),
            manually_approves_followers: Some(false),
            public_key: Some(PublicKey {
                id: self.settings.key_id(pubkey),
                owner: actor_url,
                public_key_pem: self.settings.public_key_pem.clone(),
            }),
        })
    }

    // ── following → kind 3 ──────────────────────────────────────────────────

    pub async fn contacts_from_following(&self, actor: &Actor) -> Result<Event, BridgeError> {
        let keys = self.identity.identity_for(&actor.id).await;

        let followed = match actor.following.as_deref() {
            Some(url) => self.collection_entries(&Value::String(url.to_owned()), MAX_FOLLOWING).await,
            None => Vec::new(),
        };

        let mut tags: Vec<Vec<String>> = Vec::new();
        let mut seen = HashSet::new();
        for url in followed.iter().filter_map(id_ref) {
            let pubkey = self.pubkey_for_actor(&url).await;
            if seen.insert(pubkey.clone()) {
                tags.push(vec!["p".into(), pubkey, self.settings.relay_url.clone()]);
            }
        }

        Ok(EventBuilder::new(kind::CONTACTS, actor_timestamp(actor), "").tags(tags).sign(&keys)?)
    }

    // ── Remote collections ──────────────────────────────────────────────────

    /// Entries of a remote collection, following `first` and `next` links
    /// for a bounded number of pages. `start` is the collection URL or the
    /// collection embedded in its parent object.
    pub async fn collection_entries(&self, start: &Value, max_items: usize) -> Vec<Value> {
        let mut current = match start {
            Value::String(url) => match self.client.fetch_collection(url).await {
                Ok(collection) => collection,
                Err(e) => {
                    warn!("Could not fetch collection {}: {}", url, e);
                    return Vec::new();
                }
            },
            value => match RemoteCollection::from_value(value) {
                Ok(collection) => collection,
                Err(e) => {
                    warn!("Embedded collection is malformed: {}", e);
                    return Vec::new();
                }
            },
        };

        let mut entries: Vec<Value> = Vec::new();
        for _ in 0..MAX_COLLECTION_PAGES {
            entries.extend(current.entries().cloned());
            if entries.len() >= max_items {
                entries.truncate(max_items);
                break;
            }

            let descend = if current.ordered_items.is_empty() && current.items.is_empty() {
                current.first_page()
            } else {
                None
            };
            let next = match descend {
                Some(PageRef::Embedded(page)) => Ok(*page),
                Some(PageRef::Url(url)) => self.client.fetch_collection(&url).await,
                None => match current.next.as_deref() {
                    Some(url) => self.client.fetch_collection(url).await,
                    None => break,
                },
            };
            current = match next {
                Ok(page) => page,
                Err(e) => {
                    warn!("Stopped walking collection {}: {}", current.id, e);
                    break;
                }
            };
        }
        entries
    }

    /// A Note out of a collection entry: a bare Note, a Create wrapping one,
    /// or a URL to fetch.
    pub async fn entry_note(&self, entry: &Value) -> Option<Note> {
        let object = match entry.get("type").and_then(Value::as_str) {
            Some("Create") => entry.get("object")?,
            _ => entry,
        };
        match object {
            Value::String(url) => match self.client.fetch_note(url).await {
                Ok(note) if note.kind == "Note" => Some(note),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping collection entry {}: {}", url, e);
                    None
                }
            },
            Value::Object(_) if object.get("type").and_then(Value::as_str) == Some("Note") => {
                serde_json::from_value(object.clone()).ok()
            }
            _ => None,
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Plain text out of ActivityPub HTML content.
pub fn strip_markup(html: &str) -> String {
    let text = BREAK_RE.replace_all(html, "\n");
    let text = PARAGRAPH_RE.replace_all(&text, "\n\n");
    let text = TAG_RE.replace_all(&text, "");
    decode_entities(&text).trim().to_owned()
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn parse_timestamp(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.timestamp())
}

fn actor_timestamp(actor: &Actor) -> i64 {
    actor
        .published
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or_else(|| Utc::now().timestamp())
}

pub fn format_timestamp(created_at: i64) -> String {
    DateTime::<Utc>::from_timestamp(created_at, 0)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
