/// HTTP handlers - request validation and response shaping.
///
/// Handlers stay thin: validate, call a repository, shape JSON. All SQL
/// lives in `db::*`, all pure domain rules in `services::*`.
pub mod analytics;
pub mod feedback;
pub mod health;
pub mod jobs;

pub use analytics::capture;
pub use feedback::{get_feedback, get_reasons, record_view, submit_reason, toggle_like, toggle_save};
pub use health::{health, metrics};
pub use jobs::{cancel_job, dead_letter, enqueue, get_job, list_jobs, queue_stats, retry_job};
