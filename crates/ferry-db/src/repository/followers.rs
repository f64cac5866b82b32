//! Follower edge queries.

use sqlx::PgPool;

pub async fn add(pool: &PgPool, pubkey: &str, actor_url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO follower_edge (pubkey, actor_url)
        VALUES ($1, $2)
        ON CONFLICT (pubkey, actor_url) DO NOTHING
        "#,
    )
    .bind(pubkey)
    .bind(actor_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn remove(pool: &PgPool, pubkey: &str, actor_url: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follower_edge WHERE pubkey = $1 AND actor_url = $2")
        .bind(pubkey)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove_actor(pool: &PgPool, actor_url: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM follower_edge WHERE actor_url = $1")
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn list(pool: &PgPool, pubkey: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        "SELECT actor_url FROM follower_edge WHERE pubkey = $1 ORDER BY created_at ASC",
    )
    .bind(pubkey)
    .fetch_all(pool)
    .await
}
