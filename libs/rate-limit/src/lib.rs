//! Sliding-window rate limiting for TellyAds services.
//!
//! The limiter prefers a shared Redis store so that limits hold across
//! horizontally scaled instances. When Redis is not configured (or a call
//! errors or times out) it falls back to a per-process counter map, which is
//! only correct for single-instance deployments; the fallback is logged at
//! startup so operators can tell which mode is active.
//!
//! Rate limiting is never a point of failure: Redis errors and timeouts
//! allow the request through rather than blocking it.

use redis::{aio::ConnectionManager, AsyncCommands};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::warn;

/// Limits for one window class (e.g. per-session or per-device).
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
    /// Redis operation timeout in milliseconds
    pub redis_timeout_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window_seconds: 60,
            redis_timeout_ms: 100,
        }
    }
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited,
}

struct LocalWindow {
    started: Instant,
    count: u32,
}

/// Sliding-window limiter keyed by caller-supplied strings.
pub struct SlidingWindowLimiter {
    redis: Option<ConnectionManager>,
    local: Mutex<HashMap<String, LocalWindow>>,
}

impl SlidingWindowLimiter {
    /// Build a limiter backed by a shared Redis connection.
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis: Some(redis),
            local: Mutex::new(HashMap::new()),
        }
    }

    /// Build a limiter that only has the in-process fallback. Not safe for
    /// multi-instance deployments; each instance enforces its own counters.
    pub fn in_process() -> Self {
        warn!("rate limiter running without Redis; limits are per-instance only");
        Self {
            redis: None,
            local: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_distributed(&self) -> bool {
        self.redis.is_some()
    }

    /// Count one hit against `key` and decide whether it exceeds the window.
    pub async fn check(&self, key: &str, config: &RateLimitConfig) -> Decision {
        if let Some(redis) = &self.redis {
            let result = timeout(
                Duration::from_millis(config.redis_timeout_ms),
                redis_hit(redis, key, config),
            )
            .await;

            match result {
                Ok(Ok(decision)) => return decision,
                Ok(Err(err)) => {
                    warn!(key, "rate limit Redis error (allowing request): {}", err);
                    return Decision::Allowed;
                }
                Err(_) => {
                    warn!(
                        key,
                        timeout_ms = config.redis_timeout_ms,
                        "rate limit Redis timeout (allowing request)"
                    );
                    return Decision::Allowed;
                }
            }
        }

        self.local_hit(key, config)
    }

    fn local_hit(&self, key: &str, config: &RateLimitConfig) -> Decision {
        let window = Duration::from_secs(config.window_seconds);
        let now = Instant::now();

        let mut map = match self.local.lock() {
            Ok(guard) => guard,
            // A poisoned map only loses counters, never blocks traffic.
            Err(poisoned) => poisoned.into_inner(),
        };

        // Opportunistic prune so abandoned keys do not accumulate forever.
        if map.len() > 10_000 {
            map.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = map.entry(key.to_string()).or_insert(LocalWindow {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }

        entry.count += 1;
        if entry.count > config.max_requests {
            Decision::Limited
        } else {
            Decision::Allowed
        }
    }
}

async fn redis_hit(
    redis: &ConnectionManager,
    key: &str,
    config: &RateLimitConfig,
) -> Result<Decision, String> {
    // ConnectionManager is a cheap handle over a shared multiplexed connection.
    let mut conn = redis.clone();

    let count: u32 = conn
        .incr(key, 1)
        .await
        .map_err(|e| format!("Redis incr failed: {}", e))?;

    // Set expiry on first request in the window
    if count == 1 {
        let _: () = conn
            .expire(key, config.window_seconds as i64)
            .await
            .map_err(|e| format!("Redis expire failed: {}", e))?;
    }

    if count > config.max_requests {
        Ok(Decision::Limited)
    } else {
        Ok(Decision::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_requests: u32, window_seconds: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_seconds,
            redis_timeout_ms: 100,
        }
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = SlidingWindowLimiter::in_process();
        let cfg = config(3, 60);

        for _ in 0..3 {
            assert_eq!(limiter.check("session:a", &cfg).await, Decision::Allowed);
        }
        assert_eq!(limiter.check("session:a", &cfg).await, Decision::Limited);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let limiter = SlidingWindowLimiter::in_process();
        let cfg = config(1, 60);

        assert_eq!(limiter.check("session:a", &cfg).await, Decision::Allowed);
        assert_eq!(limiter.check("session:a", &cfg).await, Decision::Limited);
        assert_eq!(limiter.check("session:b", &cfg).await, Decision::Allowed);
    }

    #[tokio::test]
    async fn window_resets_after_expiry() {
        let limiter = SlidingWindowLimiter::in_process();
        let cfg = config(1, 1);

        assert_eq!(limiter.check("device:x", &cfg).await, Decision::Allowed);
        assert_eq!(limiter.check("device:x", &cfg).await, Decision::Limited);

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(limiter.check("device:x", &cfg).await, Decision::Allowed);
    }

    #[test]
    fn default_config() {
        let cfg = RateLimitConfig::default();
        assert_eq!(cfg.max_requests, 60);
        assert_eq!(cfg.window_seconds, 60);
        assert_eq!(cfg.redis_timeout_ms, 100);
    }
}
