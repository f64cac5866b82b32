//! NIP-01 event model.
//!
//! The id of an event is the hex SHA-256 of the compact JSON array
//! `[0, pubkey, created_at, kind, tags, content]`. Anything that changes one
//! of those fields changes the id, which in turn invalidates the signature.

use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::{
    error::NostrError,
    keys::{self, Keys},
};

/// Event kinds the bridge understands.
pub mod kind {
    /// Profile metadata (replaceable).
    pub const METADATA: u16 = 0;
    /// Short text note (appendable).
    pub const TEXT_NOTE: u16 = 1;
    /// Contact list (replaceable).
    pub const CONTACTS: u16 = 3;
    /// Deletion request.
    pub const DELETION: u16 = 5;
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A signed Nostr event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Recompute the id from the event content.
    pub fn compute_id(&self) -> String {
        event_id(&self.pubkey, self.created_at, self.kind, &self.tags, &self.content)
    }

    /// Check the id and the Schnorr signature.
    pub fn verify(&self) -> Result<(), NostrError> {
        if self.compute_id() != self.id {
            return Err(NostrError::IdMismatch(self.id.clone()));
        }
        keys::verify_schnorr(&self.pubkey, &self.id, &self.sig)
    }

    /// Size of the compact JSON serialisation in bytes.
    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(usize::MAX)
    }

    /// Second element of every tag named `name`.
    pub fn tag_values(&self, name: &str) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some(name))
            .filter_map(|tag| tag.get(1).map(String::as_str))
            .collect()
    }

    /// Pubkeys referenced through `p` tags.
    pub fn mentioned_pubkeys(&self) -> Vec<&str> {
        self.tag_values("p")
    }

    /// The event this one directly replies to (NIP-10).
    ///
    /// A marked `reply` tag wins; a lone marked `root` means a direct reply to
    /// the root; otherwise the deprecated positional scheme applies and the
    /// last unmarked `e` tag is the parent.
    pub fn immediate_reply(&self) -> Option<&str> {
        let e_tags: Vec<&Vec<String>> = self
            .tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some("e") && tag.len() >= 2)
            .collect();

        for marker in ["reply", "root"] {
            for tag in &e_tags {
                if tag.get(3).map(String::as_str) == Some(marker) {
                    return Some(tag[1].as_str());
                }
            }
        }
        e_tags
            .iter()
            .rev()
            .find(|tag| tag.get(3).is_none_or(|marker| marker.is_empty()))
            .map(|tag| tag[1].as_str())
    }
}

/// Compute a NIP-01 event id.
pub fn event_id(
    pubkey: &str,
    created_at: i64,
    kind: u16,
    tags: &[Vec<String>],
    content: &str,
) -> String {
    let canonical = json!([0, pubkey, created_at, kind, tags, content]);
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

// ─── Builder ─────────────────────────────────────────────────────────────────

/// Unsigned event under construction.
#[derive(Debug, Clone)]
pub struct EventBuilder {
    kind: u16,
    created_at: i64,
    tags: Vec<Vec<String>>,
    content: String,
}

impl EventBuilder {
    pub fn new(kind: u16, created_at: i64, content: impl Into<String>) -> Self {
        Self { kind, created_at, tags: Vec::new(), content: content.into() }
    }

    pub fn tag<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.push(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn tags(mut self, tags: Vec<Vec<String>>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Compute the id and sign it with `keys`.
    pub fn sign(self, keys: &Keys) -> Result<Event, NostrError> {
        let pubkey = keys.public_hex();
        let id = event_id(&pubkey, self.created_at, self.kind, &self.tags, &self.content);
        let sig = keys.sign_id(&id)?;
        Ok(Event {
            id,
            pubkey,
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags,
            content: self.content,
            sig,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> Keys {
        Keys::from_secret_bytes(&[3u8; 32]).unwrap()
    }

    #[test]
    fn signed_event_verifies() {
        let event = EventBuilder::new(kind::TEXT_NOTE, 1_700_000_000, "hello")
            .tag(["p", "abc"])
            .sign(&keys())
            .unwrap();
        event.verify().expect("freshly signed event must verify");
        assert_eq!(event.id, event.compute_id());
    }

    #[test]
    fn tampered_content_is_rejected() {
        let mut event = EventBuilder::new(kind::TEXT_NOTE, 1, "original").sign(&keys()).unwrap();
        event.content = "edited".into();
        assert!(matches!(event.verify(), Err(NostrError::IdMismatch(_))));
    }

    #[test]
    fn forged_signature_is_rejected() {
        let mut event = EventBuilder::new(kind::TEXT_NOTE, 1, "x").sign(&keys()).unwrap();
        let other = EventBuilder::new(kind::TEXT_NOTE, 2, "y").sign(&keys()).unwrap();
        event.sig = other.sig;
        assert!(matches!(event.verify(), Err(NostrError::InvalidSignature(_))));
    }

    #[test]
    fn id_ignores_signature_but_not_tags() {
        let a = event_id("pk", 1, 1, &[], "c");
        let b = event_id("pk", 1, 1, &[vec!["e".into(), "x".into()]], "c");
        assert_ne!(a, b);
        assert_eq!(a, event_id("pk", 1, 1, &[], "c"));
    }

    fn with_tags(tags: Vec<Vec<&str>>) -> Event {
        let tags = tags
            .into_iter()
            .map(|t| t.into_iter().map(String::from).collect())
            .collect();
        EventBuilder::new(kind::TEXT_NOTE, 1, "").tags(tags).sign(&keys()).unwrap()
    }

    #[test]
    fn immediate_reply_prefers_reply_marker() {
        let event = with_tags(vec![
            vec!["e", "root-id", "", "root"],
            vec!["e", "parent-id", "", "reply"],
        ]);
        assert_eq!(event.immediate_reply(), Some("parent-id"));
    }

    #[test]
    fn immediate_reply_falls_back_to_root_marker() {
        let event = with_tags(vec![vec!["e", "root-id", "", "root"], vec!["p", "someone"]]);
        assert_eq!(event.immediate_reply(), Some("root-id"));
    }

    #[test]
    fn immediate_reply_positional_uses_last_e_tag() {
        let event = with_tags(vec![vec!["e", "first"], vec!["e", "second", "wss://r"]]);
        assert_eq!(event.immediate_reply(), Some("second"));
    }

    #[test]
    fn no_e_tags_means_no_reply() {
        assert_eq!(with_tags(vec![vec!["p", "pk"]]).immediate_reply(), None);
    }
}
