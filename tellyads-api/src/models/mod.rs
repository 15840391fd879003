/// Data models for tellyads-api
///
/// This module defines structures for:
/// - IngestionJob: one unit of video-ingestion work and its queue state
/// - Feedback: per-ad engagement aggregates and session interactions
/// - Analytics: capture request/record shapes
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

// ========================================
// Job Models
// ========================================

/// Job status in the queue lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Retry,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Retry => "RETRY",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            "RETRY" => Some(Self::Retry),
            _ => None,
        }
    }

    /// Terminal states are never mutated by the queue again, except for an
    /// operator-triggered retry out of FAILED or CANCELLED.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Where the source video comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    S3,
    Url,
    Local,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Url => "url",
            Self::Local => "local",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "s3" => Some(Self::S3),
            "url" => Some(Self::Url),
            "local" => Some(Self::Local),
            _ => None,
        }
    }
}

/// One unit of video-ingestion work
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct IngestionJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub idempotency_key: String,
    pub source_type: String,
    pub s3_key: Option<String>,
    pub source_url: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub run_after: DateTime<Utc>,
    pub last_error: Option<String>,
    pub error_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl IngestionJob {
    /// A dead-letter job has exhausted its retries and needs human triage.
    pub fn is_dead_letter(&self) -> bool {
        self.status == JobStatus::Failed && self.attempts >= self.max_attempts
    }
}

/// Validated, normalized enqueue input
#[derive(Debug, Clone)]
pub struct JobInput {
    pub source_type: SourceType,
    pub s3_key: Option<String>,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub source_type: String,
    pub s3_key: Option<String>,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub priority: Option<i32>,
    pub max_attempts: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub already_existed: bool,
    pub idempotency_key: String,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<IngestionJob>,
    pub limit: i64,
    pub offset: i64,
}

/// Per-status counts for the whole queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub by_status: HashMap<String, i64>,
    pub total: i64,
}

impl QueueStats {
    pub fn count(&self, status: JobStatus) -> i64 {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Serialize)]
pub struct StatsSummary {
    pub running: i64,
    pub pending: i64,
    pub failed: i64,
    pub has_dead_letter: bool,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub stats: QueueStats,
    pub health: &'static str,
    pub summary: StatsSummary,
}

// ========================================
// Feedback Models
// ========================================

/// Denormalized per-ad engagement counters
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdFeedbackAggregate {
    pub ad_id: String,
    pub view_count: i64,
    pub like_count: i64,
    pub save_count: i64,
    pub ai_score: Option<f64>,
    pub user_score: Option<f64>,
    pub confidence_weight: Option<f64>,
    pub final_score: Option<f64>,
    pub reason_counts: serde_json::Value,
    pub distinct_reason_sessions: i64,
    pub reason_threshold_met: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SessionBody {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ReasonBody {
    pub session_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub active: bool,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct ReasonResponse {
    pub reason_counts: serde_json::Value,
    pub distinct_sessions: i64,
    pub threshold_met: bool,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub ad_id: String,
    pub view_count: i64,
    pub like_count: i64,
    pub save_count: i64,
    pub reason_counts: serde_json::Value,
    pub distinct_reason_sessions: i64,
    pub reason_threshold_met: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_viewed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_saved: Option<bool>,
}

// ========================================
// Analytics Models
// ========================================

#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub event_type: String,
    pub session_id: String,
    pub device_hash: Option<String>,
    pub ad_id: Option<String>,
    pub properties: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_round_trip() {
        for status in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Succeeded,
            JobStatus::Failed,
            JobStatus::Cancelled,
            JobStatus::Retry,
        ] {
            assert_eq!(JobStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(JobStatus::from_str("queued"), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(!JobStatus::Retry.is_terminal());
    }

    #[test]
    fn dead_letter_requires_exhausted_attempts() {
        let mut job = sample_job(JobStatus::Failed, 5, 5);
        assert!(job.is_dead_letter());

        job.attempts = 2;
        assert!(!job.is_dead_letter());

        job.attempts = 5;
        job.status = JobStatus::Retry;
        assert!(!job.is_dead_letter());
    }

    fn sample_job(status: JobStatus, attempts: i32, max_attempts: i32) -> IngestionJob {
        IngestionJob {
            id: Uuid::new_v4(),
            status,
            priority: 0,
            attempts,
            max_attempts,
            idempotency_key: "0123456789abcdef0123456789abcdef".into(),
            source_type: "s3".into(),
            s3_key: Some("videos/a.mp4".into()),
            source_url: None,
            external_id: None,
            metadata: None,
            output: None,
            locked_at: None,
            locked_by: None,
            run_after: Utc::now(),
            last_error: None,
            error_code: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}
