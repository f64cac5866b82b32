//! Actor and note shadows written by the relay save path.

use sqlx::PgPool;

use crate::models::{ActorShadow, NoteShadow};

// ============================================================
// Actors
// ============================================================

pub async fn upsert_actor(pool: &PgPool, shadow: &ActorShadow) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO actor_shadow (pubkey, created_at, name, about, picture, raw_event)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (pubkey) DO UPDATE
        SET created_at = EXCLUDED.created_at,
            name       = EXCLUDED.name,
            about      = EXCLUDED.about,
            picture    = EXCLUDED.picture,
            raw_event  = EXCLUDED.raw_event
        WHERE actor_shadow.created_at < EXCLUDED.created_at
        "#,
    )
    .bind(&shadow.pubkey)
    .bind(shadow.created_at)
    .bind(&shadow.name)
    .bind(&shadow.about)
    .bind(&shadow.picture)
    .bind(&shadow.raw_event)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_actor(pool: &PgPool, pubkey: &str) -> Result<Option<ActorShadow>, sqlx::Error> {
    sqlx::query_as::<_, ActorShadow>(
        "SELECT pubkey, created_at, name, about, picture, raw_event FROM actor_shadow WHERE pubkey = $1",
    )
    .bind(pubkey)
    .fetch_optional(pool)
    .await
}

// ============================================================
// Notes
// ============================================================

pub async fn insert_note(pool: &PgPool, note: &NoteShadow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO note_shadow (id, pubkey, created_at, content, raw_event)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&note.id)
    .bind(&note.pubkey)
    .bind(note.created_at)
    .bind(&note.content)
    .bind(&note.raw_event)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_note(pool: &PgPool, id: &str) -> Result<Option<NoteShadow>, sqlx::Error> {
    sqlx::query_as::<_, NoteShadow>(
        "SELECT id, pubkey, created_at, content, raw_event FROM note_shadow WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_notes(
    pool: &PgPool,
    pubkey: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<NoteShadow>, sqlx::Error> {
    sqlx::query_as::<_, NoteShadow>(
        r#"
        SELECT id, pubkey, created_at, content, raw_event
        FROM note_shadow
        WHERE pubkey = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(pubkey)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn count_notes(pool: &PgPool, pubkey: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM note_shadow WHERE pubkey = $1")
        .bind(pubkey)
        .fetch_one(pool)
        .await
}

pub async fn delete_note(pool: &PgPool, id: &str, pubkey: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM note_shadow WHERE id = $1 AND pubkey = $2")
        .bind(id)
        .bind(pubkey)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
