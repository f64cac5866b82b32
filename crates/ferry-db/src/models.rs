//! Row types shared by the PostgreSQL and in-memory stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One cached event. `value` is the event's JSON serialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CacheRow {
    pub key: String,
    pub kind: i32,
    pub pubkey: String,
    pub value: String,
    pub created_at: i64,
    pub expires_at: DateTime<Utc>,
}

/// Persisted identity mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IdentityRecord {
    pub pubkey: String,
    pub actor_url: String,
    pub privkey: String,
}

/// An ActivityPub note and the event it was translated into. `raw_event` is
/// kept for good so a note is never signed twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteMapping {
    pub note_url: String,
    pub event_id: String,
    pub raw_event: String,
}

/// Profile of a Nostr user that published metadata through the bridge relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ActorShadow {
    pub pubkey: String,
    pub created_at: i64,
    pub name: String,
    pub about: String,
    pub picture: String,
    pub raw_event: String,
}

/// Text note published through the bridge relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct NoteShadow {
    pub id: String,
    pub pubkey: String,
    pub created_at: i64,
    pub content: String,
    pub raw_event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ServerKeyRecord {
    pub key_id: String,
    pub seed_bytes: Vec<u8>,
    pub public_key_b64: String,
}
