//! Note mapping queries.

use sqlx::PgPool;

use crate::models::NoteMapping;

pub async fn insert_mapping(pool: &PgPool, mapping: &NoteMapping) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO note_mapping (note_url, event_id, raw_event)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(&mapping.note_url)
    .bind(&mapping.event_id)
    .bind(&mapping.raw_event)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mapping_for(pool: &PgPool, note_url: &str) -> Result<Option<NoteMapping>, sqlx::Error> {
    sqlx::query_as::<_, NoteMapping>(
        "SELECT note_url, event_id, raw_event FROM note_mapping WHERE note_url = $1",
    )
    .bind(note_url)
    .fetch_optional(pool)
    .await
}

pub async fn event_id_for(pool: &PgPool, note_url: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT event_id FROM note_mapping WHERE note_url = $1")
        .bind(note_url)
        .fetch_optional(pool)
        .await
}

pub async fn note_url_for(pool: &PgPool, event_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT note_url FROM note_mapping WHERE event_id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await
}
