/// Queue-side domain logic: enqueue input validation, idempotency-key
/// derivation, and the operational health classification.
///
/// Everything here is pure; the SQL lives in `db::job_repo`.
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::AppError;
use crate::models::{EnqueueRequest, JobInput, QueueStats, SourceType};

/// Idempotency keys are a SHA-256 of the canonical source string,
/// truncated to 32 hex chars. Long enough that collisions are negligible
/// at ingestion volumes, short enough to index cheaply.
const IDEMPOTENCY_KEY_LEN: usize = 32;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;
pub const MAX_LIST_LIMIT: i64 = 200;

/// Three-tier operational health heuristic over queue stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueHealth {
    Healthy,
    Degraded,
    Critical,
}

impl QueueHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Critical => "critical",
        }
    }
}

/// Validate and normalize a raw enqueue request.
///
/// Rejects unknown source types, inputs with no identifying field, and
/// URLs that do not parse as absolute. Never panics on malformed input.
pub fn validate_input(raw: &EnqueueRequest) -> Result<JobInput, AppError> {
    let source_type = SourceType::from_str(raw.source_type.as_str()).ok_or_else(|| {
        AppError::ValidationError(format!(
            "source_type must be one of s3, url, local (got '{}')",
            raw.source_type
        ))
    })?;

    let s3_key = non_empty(&raw.s3_key);
    let url = non_empty(&raw.url);
    let external_id = non_empty(&raw.external_id);

    if s3_key.is_none() && url.is_none() && external_id.is_none() {
        return Err(AppError::ValidationError(
            "input must have one identifying field (s3_key, url, or external_id)".to_string(),
        ));
    }

    if let Some(raw_url) = &url {
        let parsed = Url::parse(raw_url)
            .map_err(|_| AppError::ValidationError(format!("url is not well-formed: {}", raw_url)))?;
        if !parsed.has_host() {
            return Err(AppError::ValidationError(format!(
                "url must be absolute with a host: {}",
                raw_url
            )));
        }
    }

    Ok(JobInput {
        source_type,
        s3_key,
        url,
        external_id,
        metadata: raw.metadata.clone(),
    })
}

/// Derive the stable idempotency key for a validated input.
///
/// Selection order is fixed: the object-storage key wins over the URL,
/// which wins over the external id. Two enqueues with the same effective
/// identifier therefore always resolve to the same key.
pub fn compute_idempotency_key(input: &JobInput) -> Result<String, AppError> {
    let canonical = if let Some(key) = &input.s3_key {
        format!("s3:{}", key)
    } else if let Some(url) = &input.url {
        format!("url:{}", url)
    } else if let Some(id) = &input.external_id {
        format!("id:{}", id)
    } else {
        return Err(AppError::ValidationError(
            "input must have one identifying field".to_string(),
        ));
    };

    let digest = Sha256::digest(canonical.as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(IDEMPOTENCY_KEY_LEN);
    Ok(key)
}

/// Clamp a caller-supplied list limit to the server-side maximum.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, MAX_LIST_LIMIT)
}

/// Classify overall queue health from per-status counts.
///
/// An operational heuristic, not a guarantee: thresholds picked so that a
/// handful of retries reads as degraded and a pile-up of failures pages
/// someone.
pub fn classify_health(stats: &QueueStats) -> QueueHealth {
    let failed = stats.count(crate::models::JobStatus::Failed);
    let retrying = stats.count(crate::models::JobStatus::Retry);

    if failed > 10 || retrying > 20 {
        QueueHealth::Critical
    } else if failed > 0 || retrying > 5 {
        QueueHealth::Degraded
    } else {
        QueueHealth::Healthy
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use std::collections::HashMap;

    fn request(source_type: &str) -> EnqueueRequest {
        EnqueueRequest {
            source_type: source_type.to_string(),
            s3_key: None,
            url: None,
            external_id: None,
            metadata: None,
            priority: None,
            max_attempts: None,
        }
    }

    fn input(s3_key: Option<&str>, url: Option<&str>, external_id: Option<&str>) -> JobInput {
        JobInput {
            source_type: SourceType::S3,
            s3_key: s3_key.map(String::from),
            url: url.map(String::from),
            external_id: external_id.map(String::from),
            metadata: None,
        }
    }

    #[test]
    fn key_is_deterministic() {
        let a = compute_idempotency_key(&input(Some("videos/a.mp4"), None, None)).unwrap();
        let b = compute_idempotency_key(&input(Some("videos/a.mp4"), None, None)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), IDEMPOTENCY_KEY_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn s3_key_wins_over_lower_priority_identifiers() {
        let only_s3 = compute_idempotency_key(&input(Some("videos/a.mp4"), None, None)).unwrap();
        let with_url = compute_idempotency_key(&input(
            Some("videos/a.mp4"),
            Some("https://example.com/other.mp4"),
            Some("ext-1"),
        ))
        .unwrap();
        assert_eq!(only_s3, with_url);
    }

    #[test]
    fn url_wins_over_external_id() {
        let only_url =
            compute_idempotency_key(&input(None, Some("https://example.com/a.mp4"), None)).unwrap();
        let with_ext = compute_idempotency_key(&input(
            None,
            Some("https://example.com/a.mp4"),
            Some("ext-1"),
        ))
        .unwrap();
        assert_eq!(only_url, with_ext);

        let only_ext = compute_idempotency_key(&input(None, None, Some("ext-1"))).unwrap();
        assert_ne!(only_url, only_ext);
    }

    #[test]
    fn different_identifiers_give_different_keys() {
        let a = compute_idempotency_key(&input(Some("videos/a.mp4"), None, None)).unwrap();
        let b = compute_idempotency_key(&input(Some("videos/b.mp4"), None, None)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn missing_identifier_is_a_validation_error() {
        let err = compute_idempotency_key(&input(None, None, None)).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn validate_rejects_unknown_source_type() {
        let mut raw = request("ftp");
        raw.s3_key = Some("videos/a.mp4".into());
        assert!(matches!(
            validate_input(&raw),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn validate_requires_an_identifier() {
        let raw = request("s3");
        assert!(matches!(
            validate_input(&raw),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn validate_rejects_relative_urls() {
        let mut raw = request("url");
        raw.url = Some("/relative/path.mp4".into());
        assert!(matches!(
            validate_input(&raw),
            Err(AppError::ValidationError(_))
        ));

        raw.url = Some("https://cdn.example.com/a.mp4".into());
        let input = validate_input(&raw).unwrap();
        assert_eq!(input.url.as_deref(), Some("https://cdn.example.com/a.mp4"));
    }

    #[test]
    fn validate_treats_blank_fields_as_absent() {
        let mut raw = request("s3");
        raw.s3_key = Some("   ".into());
        assert!(validate_input(&raw).is_err());
    }

    #[test]
    fn clamp_limit_bounds() {
        assert_eq!(clamp_limit(None), 50);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(5)), 5);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIST_LIMIT);
    }

    fn stats(failed: i64, retrying: i64) -> QueueStats {
        let mut by_status = HashMap::new();
        by_status.insert(JobStatus::Failed.as_str().to_string(), failed);
        by_status.insert(JobStatus::Retry.as_str().to_string(), retrying);
        QueueStats {
            by_status,
            total: failed + retrying,
        }
    }

    #[test]
    fn health_tiers() {
        assert_eq!(classify_health(&stats(0, 0)), QueueHealth::Healthy);
        assert_eq!(classify_health(&stats(0, 5)), QueueHealth::Healthy);
        assert_eq!(classify_health(&stats(1, 0)), QueueHealth::Degraded);
        assert_eq!(classify_health(&stats(0, 6)), QueueHealth::Degraded);
        assert_eq!(classify_health(&stats(11, 0)), QueueHealth::Critical);
        assert_eq!(classify_health(&stats(0, 21)), QueueHealth::Critical);
    }
}
