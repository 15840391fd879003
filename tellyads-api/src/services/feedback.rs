/// Feedback domain rules: the closed reason vocabulary and the threshold
/// gate. The transactional counter work lives in `db::feedback_repo`.
use crate::error::AppError;

/// Closed vocabulary of reason labels a session can attach to an ad.
pub const REASON_LABELS: [&str; 10] = [
    "funny",
    "catchy",
    "clever",
    "nostalgic",
    "heartwarming",
    "informative",
    "annoying",
    "boring",
    "misleading",
    "cringe",
];

/// Reason votes only surface publicly once this many distinct sessions
/// have weighed in.
pub const REASON_THRESHOLD: i64 = 3;

pub fn validate_reason(reason: &str) -> Result<&str, AppError> {
    if REASON_LABELS.contains(&reason) {
        Ok(reason)
    } else {
        Err(AppError::ValidationError(format!(
            "reason must be one of: {}",
            REASON_LABELS.join(", ")
        )))
    }
}

pub fn threshold_met(distinct_sessions: i64) -> bool {
    distinct_sessions >= REASON_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocabulary_is_closed() {
        assert!(validate_reason("funny").is_ok());
        assert!(validate_reason("catchy").is_ok());
        assert!(validate_reason("hilarious").is_err());
        assert!(validate_reason("").is_err());
        assert!(validate_reason("FUNNY").is_err());
    }

    #[test]
    fn threshold_at_three_sessions() {
        assert!(!threshold_met(0));
        assert!(!threshold_met(2));
        assert!(threshold_met(3));
        assert!(threshold_met(10));
    }
}
