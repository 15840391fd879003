/// Feedback handlers - public endpoints for per-ad engagement
use actix_web::{web, HttpResponse};
use sqlx::PgPool;

use crate::db::feedback_repo::{self, ToggleKind};
use crate::error::{AppError, Result};
use crate::models::{
    FeedbackQuery, ReasonBody, ReasonResponse, SessionBody, ToggleResponse, ViewResponse,
};
use crate::services::feedback;

pub async fn record_view(
    pool: web::Data<PgPool>,
    ad_id: web::Path<String>,
    body: web::Json<SessionBody>,
) -> Result<HttpResponse> {
    let session_id = require_session(&body.session_id)?;
    let view_count = feedback_repo::record_view(pool.get_ref(), &ad_id, session_id).await?;

    Ok(HttpResponse::Ok().json(ViewResponse { view_count }))
}

pub async fn toggle_like(
    pool: web::Data<PgPool>,
    ad_id: web::Path<String>,
    body: web::Json<SessionBody>,
) -> Result<HttpResponse> {
    toggle(pool, ToggleKind::Like, &ad_id, &body.session_id).await
}

pub async fn toggle_save(
    pool: web::Data<PgPool>,
    ad_id: web::Path<String>,
    body: web::Json<SessionBody>,
) -> Result<HttpResponse> {
    toggle(pool, ToggleKind::Save, &ad_id, &body.session_id).await
}

async fn toggle(
    pool: web::Data<PgPool>,
    kind: ToggleKind,
    ad_id: &str,
    session_id: &str,
) -> Result<HttpResponse> {
    let session_id = require_session(session_id)?;
    let (active, count) = feedback_repo::toggle(pool.get_ref(), kind, ad_id, session_id).await?;

    Ok(HttpResponse::Ok().json(ToggleResponse { active, count }))
}

pub async fn submit_reason(
    pool: web::Data<PgPool>,
    ad_id: web::Path<String>,
    body: web::Json<ReasonBody>,
) -> Result<HttpResponse> {
    let session_id = require_session(&body.session_id)?;
    let reason = feedback::validate_reason(&body.reason)?;

    let (reason_counts, distinct_sessions, met) =
        feedback_repo::submit_reason(pool.get_ref(), &ad_id, session_id, reason).await?;

    Ok(HttpResponse::Ok().json(ReasonResponse {
        reason_counts,
        distinct_sessions,
        threshold_met: met,
    }))
}

pub async fn get_reasons(pool: web::Data<PgPool>, ad_id: web::Path<String>) -> Result<HttpResponse> {
    let feedback = feedback_repo::get_feedback(pool.get_ref(), &ad_id, None).await?;

    Ok(HttpResponse::Ok().json(ReasonResponse {
        reason_counts: feedback.reason_counts,
        distinct_sessions: feedback.distinct_reason_sessions,
        threshold_met: feedback.reason_threshold_met,
    }))
}

pub async fn get_feedback(
    pool: web::Data<PgPool>,
    ad_id: web::Path<String>,
    query: web::Query<FeedbackQuery>,
) -> Result<HttpResponse> {
    let session_id = query
        .session_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let feedback = feedback_repo::get_feedback(pool.get_ref(), &ad_id, session_id).await?;
    Ok(HttpResponse::Ok().json(feedback))
}

fn require_session(raw: &str) -> Result<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::ValidationError(
            "session_id is required".to_string(),
        ));
    }
    Ok(trimmed)
}
