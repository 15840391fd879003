/// Analytics repository - append-only event persistence.
use crate::error::Result;
use crate::services::capture::SanitizedEvent;
use sqlx::PgPool;

pub async fn insert_event(pool: &PgPool, event: &SanitizedEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analytics_events (event_type, session_id, device_hash, ad_id, properties)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&event.event_type)
    .bind(&event.session_id)
    .bind(&event.device_hash)
    .bind(&event.ad_id)
    .bind(&event.properties)
    .execute(pool)
    .await?;

    Ok(())
}
