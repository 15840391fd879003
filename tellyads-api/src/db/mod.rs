/// Database access layer
///
/// Repository modules issue all SQL for the service. Every mutation is a
/// single short transaction; the unique indexes created in `migrations/`
/// are what make the dedupe and idempotence guarantees hold under
/// concurrent requests.
pub mod analytics_repo;
pub mod feedback_repo;
pub mod job_repo;
