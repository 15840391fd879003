/// Liveness and metrics endpoints
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::metrics as capture_metrics;

pub async fn health(pool: web::Data<PgPool>) -> HttpResponse {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool.get_ref())
        .await
    {
        Ok(_) => "up",
        Err(err) => {
            tracing::warn!("health check database ping failed: {}", err);
            "down"
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "database": database,
    }))
}

pub async fn metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(capture_metrics::render())
}
