//! PostgreSQL-backed [`BridgeStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{
    error::StoreError,
    models::{ActorShadow, CacheRow, IdentityRecord, NoteMapping, NoteShadow, ServerKeyRecord},
    repository::{cache, followers, identity, notes, server_keys, shadows},
    store::BridgeStore,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Health check: verify the database is reachable.
pub async fn health_check(pool: &PgPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

#[async_trait]
impl BridgeStore for PgStore {
    async fn cache_put_replaceable(&self, row: &CacheRow) -> Result<bool, StoreError> {
        Ok(cache::put_replaceable(&self.pool, row).await?)
    }

    async fn cache_put_appendable(&self, row: &CacheRow) -> Result<(), StoreError> {
        Ok(cache::put_appendable(&self.pool, row).await?)
    }

    async fn cache_get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheRow>, StoreError> {
        Ok(cache::get(&self.pool, key, now).await?)
    }

    async fn cache_list(
        &self,
        pubkey: &str,
        kind: i32,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CacheRow>, StoreError> {
        Ok(cache::list_by_author(&self.pool, pubkey, kind, limit, offset, now).await?)
    }

    async fn cache_delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(cache::delete(&self.pool, key).await?)
    }

    async fn cache_purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(cache::purge_expired(&self.pool, now).await?)
    }

    async fn insert_identity(&self, record: &IdentityRecord) -> Result<String, StoreError> {
        Ok(identity::insert(&self.pool, record).await?)
    }

    async fn actor_url_for(&self, pubkey: &str) -> Result<Option<String>, StoreError> {
        Ok(identity::actor_url_for(&self.pool, pubkey).await?)
    }

    async fn add_follower(&self, pubkey: &str, actor_url: &str) -> Result<(), StoreError> {
        Ok(followers::add(&self.pool, pubkey, actor_url).await?)
    }

    async fn remove_follower(&self, pubkey: &str, actor_url: &str) -> Result<bool, StoreError> {
        Ok(followers::remove(&self.pool, pubkey, actor_url).await?)
    }

    async fn remove_follower_everywhere(&self, actor_url: &str) -> Result<u64, StoreError> {
        Ok(followers::remove_actor(&self.pool, actor_url).await?)
    }

    async fn followers_of(&self, pubkey: &str) -> Result<Vec<String>, StoreError> {
        Ok(followers::list(&self.pool, pubkey).await?)
    }

    async fn insert_note_mapping(&self, mapping: &NoteMapping) -> Result<(), StoreError> {
        Ok(notes::insert_mapping(&self.pool, mapping).await?)
    }

    async fn note_mapping(&self, note_url: &str) -> Result<Option<NoteMapping>, StoreError> {
        Ok(notes::mapping_for(&self.pool, note_url).await?)
    }

    async fn event_id_for_note(&self, note_url: &str) -> Result<Option<String>, StoreError> {
        Ok(notes::event_id_for(&self.pool, note_url).await?)
    }

    async fn note_url_for_event(&self, event_id: &str) -> Result<Option<String>, StoreError> {
        Ok(notes::note_url_for(&self.pool, event_id).await?)
    }

    async fn upsert_actor_shadow(&self, shadow: &ActorShadow) -> Result<bool, StoreError> {
        Ok(shadows::upsert_actor(&self.pool, shadow).await?)
    }

    async fn actor_shadow(&self, pubkey: &str) -> Result<Option<ActorShadow>, StoreError> {
        Ok(shadows::find_actor(&self.pool, pubkey).await?)
    }

    async fn insert_note_shadow(&self, note: &NoteShadow) -> Result<(), StoreError> {
        Ok(shadows::insert_note(&self.pool, note).await?)
    }

    async fn note_shadow(&self, id: &str) -> Result<Option<NoteShadow>, StoreError> {
        Ok(shadows::find_note(&self.pool, id).await?)
    }

    async fn note_shadows_by(
        &self,
        pubkey: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<NoteShadow>, StoreError> {
        Ok(shadows::list_notes(&self.pool, pubkey, limit, offset).await?)
    }

    async fn count_note_shadows_by(&self, pubkey: &str) -> Result<i64, StoreError> {
        Ok(shadows::count_notes(&self.pool, pubkey).await?)
    }

    async fn delete_note_shadow(&self, id: &str, pubkey: &str) -> Result<bool, StoreError> {
        Ok(shadows::delete_note(&self.pool, id, pubkey).await?)
    }

    async fn active_server_key(&self) -> Result<Option<ServerKeyRecord>, StoreError> {
        Ok(server_keys::find_active(&self.pool).await?)
    }

    async fn insert_server_key(&self, record: &ServerKeyRecord) -> Result<(), StoreError> {
        Ok(server_keys::insert(&self.pool, record).await?)
    }

    async fn health_check(&self) -> bool {
        health_check(&self.pool).await
    }
}
