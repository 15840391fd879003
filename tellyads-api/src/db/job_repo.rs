/// Job repository - database operations for the ingestion queue.
///
/// The queue's durable state and concurrency control live here: enqueue
/// idempotence rides the unique index on idempotency_key, and worker
/// claiming uses FOR UPDATE SKIP LOCKED so two workers can never hold the
/// same job.
use crate::error::Result;
use crate::models::{IngestionJob, JobInput, JobStatus, QueueStats};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const JOB_COLUMNS: &str = "id, status, priority, attempts, max_attempts, idempotency_key, \
     source_type, s3_key, source_url, external_id, metadata, output, \
     locked_at, locked_by, run_after, last_error, error_code, \
     created_at, updated_at, started_at, completed_at";

/// Base retry delay; doubles per attempt, capped at an hour.
const RETRY_BASE_SECS: i64 = 30;
const RETRY_MAX_SECS: i64 = 3600;

/// Insert a job if no job with this idempotency key exists, otherwise
/// return the existing one. Returns `(job, already_existed)`.
pub async fn insert_or_get(
    pool: &PgPool,
    idempotency_key: &str,
    input: &JobInput,
    priority: i32,
    max_attempts: i32,
) -> Result<(IngestionJob, bool)> {
    let inserted = sqlx::query_as::<_, IngestionJob>(&format!(
        r#"
        INSERT INTO ingestion_jobs
            (idempotency_key, source_type, s3_key, source_url, external_id, metadata,
             priority, max_attempts, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'QUEUED')
        ON CONFLICT (idempotency_key) DO NOTHING
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(idempotency_key)
    .bind(input.source_type.as_str())
    .bind(&input.s3_key)
    .bind(&input.url)
    .bind(&input.external_id)
    .bind(&input.metadata)
    .bind(priority)
    .bind(max_attempts)
    .fetch_optional(pool)
    .await?;

    if let Some(job) = inserted {
        return Ok((job, false));
    }

    // Lost the race (or the job predates this call): return the existing row.
    let existing = sqlx::query_as::<_, IngestionJob>(&format!(
        "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE idempotency_key = $1"
    ))
    .bind(idempotency_key)
    .fetch_one(pool)
    .await?;

    Ok((existing, true))
}

pub async fn get_job(pool: &PgPool, id: Uuid) -> Result<Option<IngestionJob>> {
    let job = sqlx::query_as::<_, IngestionJob>(&format!(
        "SELECT {JOB_COLUMNS} FROM ingestion_jobs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(job)
}

pub async fn list_jobs(
    pool: &PgPool,
    status: Option<JobStatus>,
    limit: i64,
    offset: i64,
) -> Result<Vec<IngestionJob>> {
    let jobs = match status {
        Some(status) => {
            sqlx::query_as::<_, IngestionJob>(&format!(
                r#"
                SELECT {JOB_COLUMNS} FROM ingestion_jobs
                WHERE status = $1
                ORDER BY created_at DESC
                LIMIT $2 OFFSET $3
                "#
            ))
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, IngestionJob>(&format!(
                r#"
                SELECT {JOB_COLUMNS} FROM ingestion_jobs
                ORDER BY created_at DESC
                LIMIT $1 OFFSET $2
                "#
            ))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(jobs)
}

/// Cancel a job that has not started running. QUEUED and RETRY are the
/// only cancellable states; returns whether the cancellation took effect.
pub async fn cancel_job(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ingestion_jobs
        SET status = 'CANCELLED', completed_at = now(), updated_at = now()
        WHERE id = $1 AND status IN ('QUEUED', 'RETRY')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Reset a FAILED or CANCELLED job back to the front of the queue.
/// RUNNING and SUCCEEDED jobs are left untouched (returns false).
pub async fn retry_job(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ingestion_jobs
        SET status = 'QUEUED',
            attempts = 0,
            last_error = NULL,
            error_code = NULL,
            locked_at = NULL,
            locked_by = NULL,
            run_after = now(),
            completed_at = NULL,
            updated_at = now()
        WHERE id = $1 AND status IN ('FAILED', 'CANCELLED')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn queue_stats(pool: &PgPool) -> Result<QueueStats> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) FROM ingestion_jobs GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut by_status = HashMap::new();
    let mut total = 0;
    for (status, count) in rows {
        total += count;
        by_status.insert(status, count);
    }

    Ok(QueueStats { by_status, total })
}

/// Jobs that exhausted their retries. Human triage only; nothing in the
/// system picks these up automatically.
pub async fn dead_letter_jobs(pool: &PgPool, limit: i64) -> Result<Vec<IngestionJob>> {
    let jobs = sqlx::query_as::<_, IngestionJob>(&format!(
        r#"
        SELECT {JOB_COLUMNS} FROM ingestion_jobs
        WHERE status = 'FAILED' AND attempts >= max_attempts
        ORDER BY updated_at DESC
        LIMIT $1
        "#
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(jobs)
}

/// Atomically claim the most urgent eligible job for a worker.
///
/// Highest priority first, oldest first within a priority; RETRY jobs
/// become eligible once run_after passes. SKIP LOCKED keeps concurrent
/// workers from blocking on each other's claims.
pub async fn claim_next(pool: &PgPool, worker_id: &str) -> Result<Option<IngestionJob>> {
    let mut tx = pool.begin().await?;

    let candidate = sqlx::query_as::<_, (Uuid,)>(
        r#"
        SELECT id FROM ingestion_jobs
        WHERE status IN ('QUEUED', 'RETRY') AND run_after <= now()
        ORDER BY priority DESC, created_at ASC
        LIMIT 1
        FOR UPDATE SKIP LOCKED
        "#,
    )
    .fetch_optional(&mut *tx)
    .await?;

    let Some((id,)) = candidate else {
        tx.rollback().await?;
        return Ok(None);
    };

    let job = sqlx::query_as::<_, IngestionJob>(&format!(
        r#"
        UPDATE ingestion_jobs
        SET status = 'RUNNING',
            attempts = attempts + 1,
            locked_at = now(),
            locked_by = $2,
            started_at = COALESCE(started_at, now()),
            updated_at = now()
        WHERE id = $1
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(worker_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(job))
}

/// Mark a running job as succeeded, recording its output payload.
pub async fn complete_job(
    pool: &PgPool,
    id: Uuid,
    output: Option<serde_json::Value>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ingestion_jobs
        SET status = 'SUCCEEDED',
            output = $2,
            locked_at = NULL,
            locked_by = NULL,
            completed_at = now(),
            updated_at = now()
        WHERE id = $1 AND status = 'RUNNING'
        "#,
    )
    .bind(id)
    .bind(output)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record a worker failure. Requeues as RETRY with exponential backoff
/// until attempts reach max_attempts, at which point the job dead-letters
/// as FAILED and is never auto-retried.
pub async fn fail_job(pool: &PgPool, id: Uuid, error: &str, error_code: Option<&str>) -> Result<bool> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, (i32, i32)>(
        "SELECT attempts, max_attempts FROM ingestion_jobs \
         WHERE id = $1 AND status = 'RUNNING' FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((attempts, max_attempts)) = row else {
        tx.rollback().await?;
        return Ok(false);
    };

    if attempts >= max_attempts {
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'FAILED',
                last_error = $2,
                error_code = $3,
                locked_at = NULL,
                locked_by = NULL,
                completed_at = now(),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(error_code)
        .execute(&mut *tx)
        .await?;
    } else {
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'RETRY',
                last_error = $2,
                error_code = $3,
                locked_at = NULL,
                locked_by = NULL,
                run_after = now() + make_interval(secs => $4::double precision),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(error_code)
        .bind(retry_backoff_secs(attempts))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(true)
}

/// Exponential backoff for retry scheduling: 30s, 60s, 120s, ... capped
/// at one hour.
fn retry_backoff_secs(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 30) as u32;
    (RETRY_BASE_SECS << exponent).min(RETRY_MAX_SECS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(retry_backoff_secs(1), 30);
        assert_eq!(retry_backoff_secs(2), 60);
        assert_eq!(retry_backoff_secs(3), 120);
        assert_eq!(retry_backoff_secs(10), RETRY_MAX_SECS);
        assert_eq!(retry_backoff_secs(0), 30);
    }
}
