//! The persistence contract the bridge is written against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{ActorShadow, CacheRow, IdentityRecord, NoteMapping, NoteShadow, ServerKeyRecord},
};

/// Everything the bridge persists.
///
/// Implementations must make [`BridgeStore::cache_put_replaceable`] a single
/// atomic compare-and-write: the row is written only when no live row exists
/// for the key or the stored `created_at` is strictly older. An expired row
/// that has not been purged yet counts as absent.
#[async_trait]
pub trait BridgeStore: Send + Sync {
    // ── Event cache ─────────────────────────────────────────────────────────

    /// Write a replaceable row if it is newer than what is stored, or what is
    /// stored has expired. Returns whether the row was written.
    async fn cache_put_replaceable(&self, row: &CacheRow) -> Result<bool, StoreError>;

    /// Insert or refresh an appendable row.
    async fn cache_put_appendable(&self, row: &CacheRow) -> Result<(), StoreError>;

    /// Unexpired row for `key`.
    async fn cache_get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheRow>, StoreError>;

    /// Unexpired rows of one kind by one author, newest first.
    async fn cache_list(
        &self,
        pubkey: &str,
        kind: i32,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheRow>, StoreError>;

    async fn cache_delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Physically remove expired rows. Returns the number removed.
    async fn cache_purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    // ── Identity mapping ────────────────────────────────────────────────────

    /// Insert-if-absent keyed by pubkey. Returns the actor URL on file for the
    /// pubkey afterwards, which differs from `record.actor_url` only if the
    /// mapping was already taken.
    async fn insert_identity(&self, record: &IdentityRecord) -> Result<String, StoreError>;

    async fn actor_url_for(&self, pubkey: &str) -> Result<Option<String>, StoreError>;

    // ── Followers ───────────────────────────────────────────────────────────

    async fn add_follower(&self, pubkey: &str, actor_url: &str) -> Result<(), StoreError>;

    async fn remove_follower(&self, pubkey: &str, actor_url: &str) -> Result<bool, StoreError>;

    /// Drop every edge where `actor_url` is the follower.
    async fn remove_follower_everywhere(&self, actor_url: &str) -> Result<u64, StoreError>;

    /// Followers of `pubkey`, oldest first.
    async fn followers_of(&self, pubkey: &str) -> Result<Vec<String>, StoreError>;

    // ── Note mapping ────────────────────────────────────────────────────────

    /// Insert-if-absent. Neither side is ever remapped.
    async fn insert_note_mapping(&self, mapping: &NoteMapping) -> Result<(), StoreError>;

    async fn note_mapping(&self, note_url: &str) -> Result<Option<NoteMapping>, StoreError>;

    async fn event_id_for_note(&self, note_url: &str) -> Result<Option<String>, StoreError>;

    async fn note_url_for_event(&self, event_id: &str) -> Result<Option<String>, StoreError>;

    // ── Shadows ─────────────────────────────────────────────────────────────

    /// Newest-created_at-wins upsert. Returns whether the row was written.
    async fn upsert_actor_shadow(&self, shadow: &ActorShadow) -> Result<bool, StoreError>;

    async fn actor_shadow(&self, pubkey: &str) -> Result<Option<ActorShadow>, StoreError>;

    /// Insert, ignoring a conflicting id.
    async fn insert_note_shadow(&self, note: &NoteShadow) -> Result<(), StoreError>;

    async fn note_shadow(&self, id: &str) -> Result<Option<NoteShadow>, StoreError>;

    /// Notes by `pubkey`, newest first.
    async fn note_shadows_by(
        &self,
        pubkey: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NoteShadow>, StoreError>;

    async fn count_note_shadows_by(&self, pubkey: &str) -> Result<i64, StoreError>;

    /// Delete a note only if `pubkey` authored it.
    async fn delete_note_shadow(&self, id: &str, pubkey: &str) -> Result<bool, StoreError>;

    // ── Server key ──────────────────────────────────────────────────────────

    async fn active_server_key(&self) -> Result<Option<ServerKeyRecord>, StoreError>;

    async fn insert_server_key(&self, record: &ServerKeyRecord) -> Result<(), StoreError>;

    // ── Health ──────────────────────────────────────────────────────────────

    async fn health_check(&self) -> bool;
}
