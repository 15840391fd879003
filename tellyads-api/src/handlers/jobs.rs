/// Job queue handlers - admin HTTP endpoints for the ingestion queue
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::job_repo;
use crate::error::{AppError, Result};
use crate::models::{
    EnqueueRequest, EnqueueResponse, JobListResponse, JobStatus, ListJobsQuery, StatsResponse,
    StatsSummary,
};
use crate::services::queue;

/// Enqueue an ingestion job. Idempotent: re-posting an equivalent payload
/// returns the existing job with `already_existed = true` and HTTP 200
/// instead of 201.
pub async fn enqueue(
    pool: web::Data<PgPool>,
    req: web::Json<EnqueueRequest>,
) -> Result<HttpResponse> {
    let input = queue::validate_input(&req)?;
    let idempotency_key = queue::compute_idempotency_key(&input)?;

    let priority = req.priority.unwrap_or(0);
    let max_attempts = req
        .max_attempts
        .unwrap_or(queue::DEFAULT_MAX_ATTEMPTS)
        .clamp(1, 20);

    let (job, already_existed) =
        job_repo::insert_or_get(pool.get_ref(), &idempotency_key, &input, priority, max_attempts)
            .await?;

    let body = EnqueueResponse {
        job_id: job.id,
        status: job.status,
        already_existed,
        idempotency_key,
    };

    if already_existed {
        Ok(HttpResponse::Ok().json(body))
    } else {
        Ok(HttpResponse::Created().json(body))
    }
}

pub async fn get_job(pool: web::Data<PgPool>, id: web::Path<String>) -> Result<HttpResponse> {
    let job_id = parse_job_id(&id)?;
    let job = job_repo::get_job(pool.get_ref(), job_id)
        .await?
        .ok_or_else(|| AppError::NotFound("job not found".to_string()))?;

    Ok(HttpResponse::Ok().json(job))
}

pub async fn list_jobs(
    pool: web::Data<PgPool>,
    query: web::Query<ListJobsQuery>,
) -> Result<HttpResponse> {
    let status = match &query.status {
        Some(raw) => Some(JobStatus::from_str(raw).ok_or_else(|| {
            AppError::ValidationError(format!("unknown job status '{}'", raw))
        })?),
        None => None,
    };

    let limit = queue::clamp_limit(query.limit);
    let offset = query.offset.unwrap_or(0).max(0);

    let jobs = job_repo::list_jobs(pool.get_ref(), status, limit, offset).await?;

    Ok(HttpResponse::Ok().json(JobListResponse {
        jobs,
        limit,
        offset,
    }))
}

pub async fn cancel_job(pool: web::Data<PgPool>, id: web::Path<String>) -> Result<HttpResponse> {
    let job_id = parse_job_id(&id)?;

    if job_repo::get_job(pool.get_ref(), job_id).await?.is_none() {
        return Err(AppError::NotFound("job not found".to_string()));
    }

    let cancelled = job_repo::cancel_job(pool.get_ref(), job_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "cancelled": cancelled })))
}

pub async fn retry_job(pool: web::Data<PgPool>, id: web::Path<String>) -> Result<HttpResponse> {
    let job_id = parse_job_id(&id)?;

    if job_repo::get_job(pool.get_ref(), job_id).await?.is_none() {
        return Err(AppError::NotFound("job not found".to_string()));
    }

    let retried = job_repo::retry_job(pool.get_ref(), job_id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "retried": retried })))
}

pub async fn queue_stats(pool: web::Data<PgPool>) -> Result<HttpResponse> {
    let stats = job_repo::queue_stats(pool.get_ref()).await?;
    let health = queue::classify_health(&stats);

    let has_dead_letter = !job_repo::dead_letter_jobs(pool.get_ref(), 1).await?.is_empty();

    let summary = StatsSummary {
        running: stats.count(JobStatus::Running),
        pending: stats.count(JobStatus::Queued) + stats.count(JobStatus::Retry),
        failed: stats.count(JobStatus::Failed),
        has_dead_letter,
    };

    Ok(HttpResponse::Ok().json(StatsResponse {
        stats,
        health: health.as_str(),
        summary,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<i64>,
}

pub async fn dead_letter(
    pool: web::Data<PgPool>,
    query: web::Query<DeadLetterQuery>,
) -> Result<HttpResponse> {
    let limit = queue::clamp_limit(query.limit);
    let jobs = job_repo::dead_letter_jobs(pool.get_ref(), limit).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "jobs": jobs })))
}

fn parse_job_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError("invalid job id".to_string()))
}
