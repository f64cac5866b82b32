//! Identity mapping queries.

use sqlx::PgPool;

use crate::models::IdentityRecord;

/// Insert-if-absent. The no-op update on conflict lets `RETURNING` report the
/// row already on file.
pub async fn insert(pool: &PgPool, record: &IdentityRecord) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        INSERT INTO identity_mapping (pubkey, actor_url, privkey)
        VALUES ($1, $2, $3)
        ON CONFLICT (pubkey) DO UPDATE SET pubkey = EXCLUDED.pubkey
        RETURNING actor_url
        "#,
    )
    .bind(&record.pubkey)
    .bind(&record.actor_url)
    .bind(&record.privkey)
    .fetch_one(pool)
    .await
}

pub async fn actor_url_for(pool: &PgPool, pubkey: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT actor_url FROM identity_mapping WHERE pubkey = $1")
        .bind(pubkey)
        .fetch_optional(pool)
        .await
}
