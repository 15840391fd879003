/// Feedback repository - transactional per-ad engagement counters.
///
/// Each operation is one short transaction: check the (ad, session)
/// interaction row, adjust it, and upsert the aggregate so counters and
/// rows can never drift apart mid-request. Reason aggregates are rebuilt
/// from scratch on every vote rather than adjusted incrementally; the
/// group-by is cheap at per-ad vote volumes and can never accumulate
/// drift.
use crate::error::Result;
use crate::models::{AdFeedbackAggregate, FeedbackResponse};
use crate::services::feedback::threshold_met;
use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, Transaction};

/// Which toggle table an operation targets. Table and column names are
/// compile-time constants, never caller input.
#[derive(Debug, Clone, Copy)]
pub enum ToggleKind {
    Like,
    Save,
}

impl ToggleKind {
    fn table(&self) -> &'static str {
        match self {
            Self::Like => "ad_likes",
            Self::Save => "ad_saves",
        }
    }

    fn counter(&self) -> &'static str {
        match self {
            Self::Like => "like_count",
            Self::Save => "save_count",
        }
    }
}

/// Record a view once per (ad, session); repeats are no-ops. Returns the
/// view count after the operation.
pub async fn record_view(pool: &PgPool, ad_id: &str, session_id: &str) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO ad_views (ad_id, session_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(ad_id)
    .bind(session_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let count: i64 = if inserted > 0 {
        sqlx::query_scalar(
            r#"
            INSERT INTO ad_feedback (ad_id, view_count) VALUES ($1, 1)
            ON CONFLICT (ad_id) DO UPDATE
            SET view_count = ad_feedback.view_count + 1, updated_at = now()
            RETURNING view_count
            "#,
        )
        .bind(ad_id)
        .fetch_one(&mut *tx)
        .await?
    } else {
        sqlx::query_scalar("SELECT view_count FROM ad_feedback WHERE ad_id = $1")
            .bind(ad_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0)
    };

    tx.commit().await?;
    Ok(count)
}

/// Strict toggle: present deletes and decrements (floored at zero),
/// absent inserts and increments. Returns `(active, count)`.
pub async fn toggle(
    pool: &PgPool,
    kind: ToggleKind,
    ad_id: &str,
    session_id: &str,
) -> Result<(bool, i64)> {
    let mut tx = pool.begin().await?;

    let removed = sqlx::query(&format!(
        "DELETE FROM {} WHERE ad_id = $1 AND session_id = $2",
        kind.table()
    ))
    .bind(ad_id)
    .bind(session_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let (active, count) = if removed > 0 {
        let count: i64 = sqlx::query_scalar(&format!(
            r#"
            INSERT INTO ad_feedback (ad_id, {col}) VALUES ($1, 0)
            ON CONFLICT (ad_id) DO UPDATE
            SET {col} = GREATEST(ad_feedback.{col} - 1, 0), updated_at = now()
            RETURNING {col}
            "#,
            col = kind.counter()
        ))
        .bind(ad_id)
        .fetch_one(&mut *tx)
        .await?;
        (false, count)
    } else {
        let inserted = sqlx::query(&format!(
            "INSERT INTO {} (ad_id, session_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            kind.table()
        ))
        .bind(ad_id)
        .bind(session_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let count: i64 = if inserted > 0 {
            sqlx::query_scalar(&format!(
                r#"
                INSERT INTO ad_feedback (ad_id, {col}) VALUES ($1, 1)
                ON CONFLICT (ad_id) DO UPDATE
                SET {col} = ad_feedback.{col} + 1, updated_at = now()
                RETURNING {col}
                "#,
                col = kind.counter()
            ))
            .bind(ad_id)
            .fetch_one(&mut *tx)
            .await?
        } else {
            // Raced another request that inserted first; treat as active
            // without double-counting.
            sqlx::query_scalar(&format!(
                "SELECT {} FROM ad_feedback WHERE ad_id = $1",
                kind.counter()
            ))
            .bind(ad_id)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0)
        };
        (true, count)
    };

    tx.commit().await?;
    Ok((active, count))
}

/// Upsert the session's reason (last write wins), then rebuild the
/// reason aggregate from the source-of-truth rows. Returns
/// `(reason_counts, distinct_sessions, threshold_met)`.
pub async fn submit_reason(
    pool: &PgPool,
    ad_id: &str,
    session_id: &str,
    reason: &str,
) -> Result<(Value, i64, bool)> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO ad_reasons (ad_id, session_id, reason) VALUES ($1, $2, $3)
        ON CONFLICT (ad_id, session_id) DO UPDATE
        SET reason = EXCLUDED.reason, updated_at = now()
        "#,
    )
    .bind(ad_id)
    .bind(session_id)
    .bind(reason)
    .execute(&mut *tx)
    .await?;

    let (counts, distinct) = recompute_reasons(&mut tx, ad_id).await?;
    let met = threshold_met(distinct);

    sqlx::query(
        r#"
        INSERT INTO ad_feedback
            (ad_id, reason_counts, distinct_reason_sessions, reason_threshold_met)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (ad_id) DO UPDATE
        SET reason_counts = EXCLUDED.reason_counts,
            distinct_reason_sessions = EXCLUDED.distinct_reason_sessions,
            reason_threshold_met = EXCLUDED.reason_threshold_met,
            updated_at = now()
        "#,
    )
    .bind(ad_id)
    .bind(&counts)
    .bind(distinct)
    .bind(met)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((counts, distinct, met))
}

/// Fresh group-by over the reason rows for one ad.
async fn recompute_reasons(
    tx: &mut Transaction<'_, Postgres>,
    ad_id: &str,
) -> Result<(Value, i64)> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT reason, COUNT(*) FROM ad_reasons WHERE ad_id = $1 GROUP BY reason",
    )
    .bind(ad_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut counts = Map::new();
    for (reason, count) in rows {
        counts.insert(reason, Value::from(count));
    }

    let distinct: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT session_id) FROM ad_reasons WHERE ad_id = $1")
            .bind(ad_id)
            .fetch_one(&mut **tx)
            .await?;

    Ok((Value::Object(counts), distinct))
}

/// Read the aggregate (zero-defaulted when no row exists yet) plus the
/// caller session's own interaction flags when a session is supplied.
pub async fn get_feedback(
    pool: &PgPool,
    ad_id: &str,
    session_id: Option<&str>,
) -> Result<FeedbackResponse> {
    let aggregate = sqlx::query_as::<_, AdFeedbackAggregate>(
        r#"
        SELECT ad_id, view_count, like_count, save_count,
               ai_score, user_score, confidence_weight, final_score,
               reason_counts, distinct_reason_sessions, reason_threshold_met,
               created_at, updated_at
        FROM ad_feedback WHERE ad_id = $1
        "#,
    )
    .bind(ad_id)
    .fetch_optional(pool)
    .await?;

    let mut response = match aggregate {
        Some(agg) => FeedbackResponse {
            ad_id: agg.ad_id,
            view_count: agg.view_count,
            like_count: agg.like_count,
            save_count: agg.save_count,
            reason_counts: agg.reason_counts,
            distinct_reason_sessions: agg.distinct_reason_sessions,
            reason_threshold_met: agg.reason_threshold_met,
            has_viewed: None,
            has_liked: None,
            has_saved: None,
        },
        None => FeedbackResponse {
            ad_id: ad_id.to_string(),
            view_count: 0,
            like_count: 0,
            save_count: 0,
            reason_counts: Value::Object(Map::new()),
            distinct_reason_sessions: 0,
            reason_threshold_met: false,
            has_viewed: None,
            has_liked: None,
            has_saved: None,
        },
    };

    if let Some(session_id) = session_id {
        response.has_viewed = Some(session_exists(pool, "ad_views", ad_id, session_id).await?);
        response.has_liked = Some(session_exists(pool, "ad_likes", ad_id, session_id).await?);
        response.has_saved = Some(session_exists(pool, "ad_saves", ad_id, session_id).await?);
    }

    Ok(response)
}

async fn session_exists(
    pool: &PgPool,
    table: &'static str,
    ad_id: &str,
    session_id: &str,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE ad_id = $1 AND session_id = $2)",
        table
    ))
    .bind(ad_id)
    .bind(session_id)
    .fetch_one(pool)
    .await?;

    Ok(exists)
}
