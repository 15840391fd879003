/// Configuration management for tellyads-api
///
/// Loads configuration from environment variables with sensible defaults.
use rate_limit::RateLimitConfig;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub cors: CorsConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub admin: AdminConfig,
    pub capture: CaptureConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RedisConfig {
    /// Optional; when absent the rate limiter falls back to its
    /// per-instance map.
    pub url: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdminConfig {
    /// Valid admin keys. Comma-separated in ADMIN_API_KEYS to support
    /// rotation. Empty means the admin surface is disabled, not open.
    pub api_keys: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CaptureConfig {
    pub session_limit: RateLimitConfig,
    pub device_limit: RateLimitConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("TELLYADS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("TELLYADS_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .map(|v| split_csv(&v))
                    .unwrap_or_else(|_| vec!["*".to_string()]),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "postgresql://localhost/tellyads".to_string()),
                max_connections: std::env::var("DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            },
            admin: AdminConfig {
                api_keys: std::env::var("ADMIN_API_KEYS")
                    .map(|v| split_csv(&v))
                    .unwrap_or_default(),
            },
            capture: CaptureConfig {
                session_limit: RateLimitConfig {
                    max_requests: env_u32("CAPTURE_SESSION_MAX_REQUESTS", 60),
                    window_seconds: env_u64("CAPTURE_WINDOW_SECONDS", 60),
                    redis_timeout_ms: 100,
                },
                device_limit: RateLimitConfig {
                    max_requests: env_u32("CAPTURE_DEVICE_MAX_REQUESTS", 120),
                    window_seconds: env_u64("CAPTURE_WINDOW_SECONDS", 60),
                    redis_timeout_ms: 100,
                },
            },
        })
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_drops_empties() {
        assert_eq!(
            split_csv("key-a, key-b,,key-c "),
            vec!["key-a", "key-b", "key-c"]
        );
        assert!(split_csv("").is_empty());
    }
}
