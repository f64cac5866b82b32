//! Server signing key storage.

use sqlx::PgPool;

use crate::models::ServerKeyRecord;

/// Newest active, unexpired key.
pub async fn find_active(pool: &PgPool) -> Result<Option<ServerKeyRecord>, sqlx::Error> {
    sqlx::query_as::<_, ServerKeyRecord>(
        r#"
        SELECT key_id, seed_bytes, public_key_b64
        FROM server_keys
        WHERE is_active = TRUE AND (expires_at IS NULL OR expires_at > NOW())
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await
}

pub async fn insert(pool: &PgPool, record: &ServerKeyRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO server_keys (key_id, seed_bytes, public_key_b64, is_active)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (key_id) DO NOTHING
        "#,
    )
    .bind(&record.key_id)
    .bind(&record.seed_bytes)
    .bind(&record.public_key_b64)
    .execute(pool)
    .await?;
    Ok(())
}
