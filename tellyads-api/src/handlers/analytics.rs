/// Analytics capture - always 204, by design.
///
/// Telemetry must never degrade the primary user experience, so this
/// endpoint parses its own body and swallows every failure mode: bad
/// JSON, unknown event types, rate limiting, and database errors all
/// produce the same 204. Drops are visible only in logs and metrics.
use actix_web::{web, HttpResponse};
use rate_limit::{Decision, SlidingWindowLimiter};
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::Config;
use crate::db::analytics_repo;
use crate::metrics;
use crate::models::CaptureRequest;
use crate::services::capture;

pub async fn capture(
    pool: web::Data<PgPool>,
    limiter: web::Data<Arc<SlidingWindowLimiter>>,
    config: web::Data<Config>,
    body: web::Bytes,
) -> HttpResponse {
    let raw: CaptureRequest = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!("capture body rejected: {}", err);
            metrics::CAPTURE_REJECTED.inc();
            return HttpResponse::NoContent().finish();
        }
    };

    let event = match capture::sanitize(raw) {
        Ok(event) => event,
        Err(reason) => {
            tracing::debug!("capture event dropped: {:?}", reason);
            metrics::CAPTURE_REJECTED.inc();
            return HttpResponse::NoContent().finish();
        }
    };

    let session_key = format!("capture:session:{}", event.session_id);
    if limiter.check(&session_key, &config.capture.session_limit).await == Decision::Limited {
        metrics::CAPTURE_RATE_LIMITED.inc();
        return HttpResponse::NoContent().finish();
    }

    if let Some(device_hash) = &event.device_hash {
        let device_key = format!("capture:device:{}", device_hash);
        if limiter.check(&device_key, &config.capture.device_limit).await == Decision::Limited {
            metrics::CAPTURE_RATE_LIMITED.inc();
            return HttpResponse::NoContent().finish();
        }
    }

    match analytics_repo::insert_event(pool.get_ref(), &event).await {
        Ok(()) => metrics::CAPTURE_ACCEPTED.inc(),
        Err(err) => {
            tracing::warn!("capture write failed: {}", err);
            metrics::CAPTURE_FAILED.inc();
        }
    }

    HttpResponse::NoContent().finish()
}
