//! TellyAds API
//!
//! Backend for the TellyAds archive: the video-ingestion job queue,
//! per-ad feedback aggregation, and analytics capture, all served over
//! HTTP against PostgreSQL.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

// Public re-exports
pub use config::Config;
pub use error::{AppError, Result};
