//! Event cache queries.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::CacheRow;

/// Conditional upsert for replaceable keys.
///
/// The `WHERE` on the conflict arm makes the newer-wins check and the write a
/// single statement, so two concurrent writers cannot both win. An expired
/// row counts as absent.
pub async fn put_replaceable(pool: &PgPool, row: &CacheRow) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO cache (key, kind, pubkey, value, created_at, observed_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6)
        ON CONFLICT (key) DO UPDATE
        SET value       = EXCLUDED.value,
            created_at  = EXCLUDED.created_at,
            observed_at = EXCLUDED.observed_at,
            expires_at  = EXCLUDED.expires_at
        WHERE cache.created_at < EXCLUDED.created_at OR cache.expires_at <= NOW()
        "#,
    )
    .bind(&row.key)
    .bind(row.kind)
    .bind(&row.pubkey)
    .bind(&row.value)
    .bind(row.created_at)
    .bind(row.expires_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Upsert for appendable keys; a repeat refreshes the expiry.
pub async fn put_appendable(pool: &PgPool, row: &CacheRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cache (key, kind, pubkey, value, created_at, observed_at, expires_at)
        VALUES ($1, $2, $3, $4, $5, NOW(), $6)
        ON CONFLICT (key) DO UPDATE
        SET observed_at = EXCLUDED.observed_at,
            expires_at  = EXCLUDED.expires_at
        "#,
    )
    .bind(&row.key)
    .bind(row.kind)
    .bind(&row.pubkey)
    .bind(&row.value)
    .bind(row.created_at)
    .bind(row.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(
    pool: &PgPool,
    key: &str,
    now: DateTime<Utc>,
) -> Result<Option<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT key, kind, pubkey, value, created_at, expires_at
        FROM cache
        WHERE key = $1 AND expires_at > $2
        "#,
    )
    .bind(key)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub async fn list_by_author(
    pool: &PgPool,
    pubkey: &str,
    kind: i32,
    limit: i64,
    offset: i64,
    now: DateTime<Utc>,
) -> Result<Vec<CacheRow>, sqlx::Error> {
    sqlx::query_as::<_, CacheRow>(
        r#"
        SELECT key, kind, pubkey, value, created_at, expires_at
        FROM cache
        WHERE pubkey = $1 AND kind = $2 AND expires_at > $3
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(pubkey)
    .bind(kind)
    .bind(now)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache WHERE expires_at <= $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
