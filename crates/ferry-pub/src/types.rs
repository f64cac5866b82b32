//! ActivityStreams documents, the wire format of the ActivityPub side.
//!
//! Remote servers disagree on the shape of several properties (a link can be a
//! bare URL, an object with an `id`/`href`, or an array of either). Inbound
//! fields that carry references are therefore normalised to plain URL strings
//! while deserialising; everything the bridge emits uses the plain form.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

pub const AS_CONTEXT: &str = "https://www.w3.org/ns/activitystreams";
pub const SECURITY_CONTEXT: &str = "https://w3id.org/security/v1";
/// The public addressing collection.
pub const PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";
pub const ACTIVITY_JSON: &str = "application/activity+json";

/// `@context` value attached to every top-level document the bridge serves.
pub fn default_context() -> Value {
    json!([AS_CONTEXT, SECURITY_CONTEXT])
}

/// True for the three spellings of the public collection.
pub fn is_public(address: &str) -> bool {
    matches!(address, PUBLIC | "as:Public" | "Public")
}

pub fn is_followers_collection(address: &str) -> bool {
    address.ends_with("/followers")
}

// ─── Actors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "opt_image", skip_serializing_if = "Option::is_none")]
    pub icon: Option<Image>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub inbox: Option<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub outbox: Option<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub followers: Option<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub following: Option<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manually_approves_followers: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
}

impl Actor {
    pub fn icon_url(&self) -> Option<&str> {
        self.icon.as_ref().map(|image| image.url.as_str()).filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

impl Image {
    pub fn new(url: impl Into<String>) -> Self {
        Self { kind: "Image".into(), url: url.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    pub id: String,
    pub owner: String,
    pub public_key_pem: String,
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "req_id")]
    pub attributed_to: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default, deserialize_with = "id_list", skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, deserialize_with = "id_list", skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, deserialize_with = "opt_id", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Either the URL of the replies collection or the collection embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replies: Option<Value>,
}

impl Note {
    /// Recipients in `to` followed by `cc`.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to.iter().chain(self.cc.iter()).map(String::as_str)
    }
}

// ─── Activities ──────────────────────────────────────────────────────────────

/// An outbound activity wrapping an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub actor: String,
    pub object: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

impl Activity {
    /// `Create` wrapping `note`, addressed like the note itself.
    pub fn create(id: impl Into<String>, note: &Note) -> Result<Self, serde_json::Error> {
        let mut object = note.clone();
        object.context = None;
        Ok(Self {
            context: Some(default_context()),
            id: id.into(),
            kind: "Create".into(),
            actor: note.attributed_to.clone(),
            object: serde_json::to_value(object)?,
            to: note.to.clone(),
            cc: note.cc.clone(),
            published: note.published.clone(),
        })
    }

    /// `Accept` answering the activity `object`.
    pub fn accept(id: impl Into<String>, actor: impl Into<String>, object: Value) -> Self {
        Self {
            context: Some(default_context()),
            id: id.into(),
            kind: "Accept".into(),
            actor: actor.into(),
            object,
            to: Vec::new(),
            cc: Vec::new(),
            published: None,
        }
    }
}

// ─── Collections ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection<T> {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub total_items: usize,
    pub first: OrderedCollectionPage<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage<T> {
    #[serde(rename = "@context", default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub part_of: String,
    pub total_items: usize,
    pub ordered_items: Vec<T>,
}

/// A collection (or collection page) fetched from a remote server.
///
/// Accepts both `Collection` and `OrderedCollection` shapes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCollection {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub total_items: Option<u64>,
    #[serde(default)]
    pub first: Option<Value>,
    #[serde(default, deserialize_with = "opt_id")]
    pub next: Option<String>,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default)]
    pub ordered_items: Vec<Value>,
}

/// Where the first page of a remote collection lives.
#[derive(Debug, Clone)]
pub enum PageRef {
    Url(String),
    Embedded(Box<RemoteCollection>),
}

impl RemoteCollection {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    /// Raw entries of this page, `orderedItems` first.
    pub fn entries(&self) -> impl Iterator<Item = &Value> {
        self.ordered_items.iter().chain(self.items.iter())
    }

    pub fn first_page(&self) -> Option<PageRef> {
        match self.first.as_ref()? {
            Value::String(url) => Some(PageRef::Url(url.clone())),
            value @ Value::Object(_) => {
                Self::from_value(value).ok().map(|page| PageRef::Embedded(Box::new(page)))
            }
            _ => None,
        }
    }
}

// ─── WebFinger ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFinger {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub links: Vec<WebFingerLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebFingerLink {
    pub rel: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl WebFinger {
    /// The ActivityPub actor URL advertised through the `self` link.
    pub fn actor_url(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| {
                link.rel == "self"
                    && link.kind.as_deref().is_none_or(|kind| {
                        kind == ACTIVITY_JSON || kind.starts_with("application/ld+json")
                    })
            })
            .and_then(|link| link.href.as_deref())
    }
}

// ─── Lenient reference decoding ──────────────────────────────────────────────

/// Reduce a link-ish value to a URL.
pub fn id_ref(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("href"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        Value::Array(items) => items.iter().find_map(id_ref),
        _ => None,
    }
}

fn opt_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_ref))
}

fn req_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(opt_id(deserializer)?.unwrap_or_default())
}

fn id_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items.iter().filter_map(id_ref).collect(),
        Some(value) => id_ref(&value).into_iter().collect(),
        None => Vec::new(),
    })
}

fn opt_image<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Image>, D::Error> {
    fn image(value: &Value) -> Option<Image> {
        match value {
            Value::String(url) => Some(Image::new(url.clone())),
            Value::Object(map) => map.get("url").and_then(id_ref).map(Image::new),
            Value::Array(items) => items.iter().find_map(image),
            _ => None,
        }
    }
    Ok(Option::<Value>::deserialize(deserializer)?.as_ref().and_then(image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_mastodon_style_actor() {
        let actor: Actor = serde_json::from_value(json!({
            "@context": [AS_CONTEXT, SECURITY_CONTEXT],
            "id": "https://mastodon.example/users/alice",
            "type": "Person",
            "preferredUsername": "alice",
            "name": "Alice",
            "inbox": "https://mastodon.example/users/alice/inbox",
            "following": "https://mastodon.example/users/alice/following",
            "icon": { "type": "Image", "mediaType": "image/png", "url": "https://cdn.example/a.png" },
            "url": [{ "type": "Link", "href": "https://mastodon.example/@alice" }]
        }))
        .unwrap();

        assert_eq!(actor.icon_url(), Some("https://cdn.example/a.png"));
        assert_eq!(actor.url.as_deref(), Some("https://mastodon.example/@alice"));
        assert_eq!(actor.inbox.as_deref(), Some("https://mastodon.example/users/alice/inbox"));
        assert!(actor.public_key.is_none());
    }

    #[test]
    fn decodes_note_with_loose_addressing() {
        let note: Note = serde_json::from_value(json!({
            "id": "https://mastodon.example/notes/1",
            "type": "Note",
            "attributedTo": { "id": "https://mastodon.example/users/alice", "type": "Person" },
            "content": "<p>hi</p>",
            "to": PUBLIC,
            "cc": ["https://mastodon.example/users/alice/followers", "https://other.example/u/bob"],
            "inReplyTo": null
        }))
        .unwrap();

        assert_eq!(note.attributed_to, "https://mastodon.example/users/alice");
        assert_eq!(note.to, vec![PUBLIC.to_owned()]);
        assert_eq!(note.recipients().count(), 3);
        assert!(note.in_reply_to.is_none());
    }

    #[test]
    fn serialised_actor_uses_camel_case() {
        let actor = Actor {
            id: "https://ferry.example/actor/pk".into(),
            kind: "Person".into(),
            public_key: Some(PublicKey {
                id: "https://ferry.example/actor/pk#main-key".into(),
                owner: "https://ferry.example/actor/pk".into(),
                public_key_pem: "PEM".into(),
            }),
            ..Default::default()
        };
        let value = serde_json::to_value(&actor).unwrap();
        assert_eq!(value["publicKey"]["publicKeyPem"], "PEM");
        assert!(value.get("preferredUsername").is_none());
    }

    #[test]
    fn create_wraps_note_without_nested_context() {
        let note = Note {
            context: Some(default_context()),
            id: "https://ferry.example/note/abc".into(),
            kind: "Note".into(),
            attributed_to: "https://ferry.example/actor/pk".into(),
            content: "hello".into(),
            to: vec![PUBLIC.into()],
            ..Default::default()
        };
        let create = Activity::create("https://ferry.example/note/abc/activity", &note).unwrap();
        assert_eq!(create.actor, note.attributed_to);
        assert_eq!(create.to, note.to);
        assert!(create.object.get("@context").is_none());
        assert_eq!(create.object["content"], "hello");
    }

    #[test]
    fn remote_collection_first_page_forms() {
        let by_url = RemoteCollection::from_value(&json!({
            "type": "OrderedCollection", "first": "https://x/following?page=1"
        }))
        .unwrap();
        assert!(matches!(by_url.first_page(), Some(PageRef::Url(url)) if url.ends_with("page=1")));

        let embedded = RemoteCollection::from_value(&json!({
            "type": "Collection",
            "first": { "type": "CollectionPage", "items": ["https://x/a", { "id": "https://x/b" }] }
        }))
        .unwrap();
        match embedded.first_page() {
            Some(PageRef::Embedded(page)) => {
                let ids: Vec<String> = page.entries().filter_map(id_ref).collect();
                assert_eq!(ids, vec!["https://x/a".to_owned(), "https://x/b".to_owned()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn webfinger_self_link() {
        let wf: WebFinger = serde_json::from_value(json!({
            "subject": "acct:alice@mastodon.example",
            "links": [
                { "rel": "http://webfinger.net/rel/profile-page", "type": "text/html", "href": "https://mastodon.example/@alice" },
                { "rel": "self", "type": ACTIVITY_JSON, "href": "https://mastodon.example/users/alice" }
            ]
        }))
        .unwrap();
        assert_eq!(wf.actor_url(), Some("https://mastodon.example/users/alice"));
    }
}
