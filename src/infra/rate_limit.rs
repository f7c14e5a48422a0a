use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use redis::{Script, aio::ConnectionManager};

use super::error::InfraError;
use crate::app_error::{AppError, AppResult};

/// Trait for rate limiting implementations.
#[async_trait]
pub trait RateLimiterTrait: Send + Sync {
    /// Count one request from `source_id`.
    /// Returns Ok(()) if within limits, Err(AppError::RateLimited) if exceeded.
    async fn check(&self, source_id: &str) -> AppResult<()>;
}

// ============================================================================
// In-process fixed window
// ============================================================================

/// Prune expired windows once the map holds this many sources.
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u64,
    started_at: Instant,
}

/// Process-local fixed-window limiter.
///
/// Counters live in this process only; run [`RedisRateLimiter`] when more than one
/// instance serves the callback endpoint.
pub struct FixedWindowRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    window: Duration,
    max_requests: u64,
}

impl FixedWindowRateLimiter {
    pub fn new(window: Duration, max_requests: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    pub fn allow(&self, source_id: &str) -> bool {
        self.allow_at(source_id, Instant::now())
    }

    fn allow_at(&self, source_id: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started_at) < window);
        }

        let entry = windows.entry(source_id.to_string()).or_insert(Window {
            count: 0,
            started_at: now,
        });

        if now.duration_since(entry.started_at) >= self.window {
            *entry = Window {
                count: 0,
                started_at: now,
            };
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }
}

#[async_trait]
impl RateLimiterTrait for FixedWindowRateLimiter {
    async fn check(&self, source_id: &str) -> AppResult<()> {
        if self.allow(source_id) {
            Ok(())
        } else {
            Err(AppError::RateLimited)
        }
    }
}

// ============================================================================
// Redis
// ============================================================================

/// Lua script for atomic increment with TTL.
/// Returns the new count after increment.
/// A key left without a TTL gets one on its next hit.
const INCR_WITH_TTL_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
elseif redis.call('TTL', KEYS[1]) == -1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return current
"#;

/// Redis-backed limiter shared across instances.
#[derive(Clone)]
pub struct RedisRateLimiter {
    manager: ConnectionManager,
    window_secs: u64,
    max_requests: u64,
    script: Script,
}

impl RedisRateLimiter {
    pub async fn new(
        redis_url: &str,
        window_secs: u64,
        max_requests: u64,
    ) -> Result<Self, InfraError> {
        let client = redis::Client::open(redis_url).map_err(InfraError::RedisConnection)?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(InfraError::RedisConnection)?;
        Ok(Self {
            manager,
            window_secs,
            max_requests,
            script: Script::new(INCR_WITH_TTL_SCRIPT),
        })
    }
}

#[async_trait]
impl RateLimiterTrait for RedisRateLimiter {
    async fn check(&self, source_id: &str) -> AppResult<()> {
        let mut conn = self.manager.clone();
        let current: u64 = self
            .script
            .key(format!("rate:callback:{source_id}"))
            .arg(self.window_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        if current > self.max_requests {
            return Err(AppError::RateLimited);
        }

        Ok(())
    }
}
