// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Fixed-window rate limiter backends.
//!
//! The process-wide instance is created from configuration on startup and
//! memoized; re-initializing replaces it wholesale, which clears every
//! window (the test harness resets between cases this way).

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::Script;

use crate::config::AppConfig;
use crate::domain::error::CoreError;
use crate::domain::rate_limit::{RateLimitError, RateLimiter};

static GLOBAL_LIMITER: Mutex<Option<Arc<dyn RateLimiter>>> = Mutex::new(None);

/// Build the configured backend and install it as the process-wide
/// instance. Always starts with empty windows.
pub fn init_rate_limiter(config: &AppConfig) -> Result<Arc<dyn RateLimiter>, CoreError> {
    let limiter: Arc<dyn RateLimiter> = match config.rate_limit_backend.to_lowercase().as_str() {
        "memory" => Arc::new(InMemoryRateLimiter::new()),
        "redis" => Arc::new(RedisRateLimiter::new(&config.rate_limit_redis_url)?),
        other => {
            return Err(CoreError::Internal(format!(
                "Unknown rate limit backend: {other}"
            )))
        }
    };
    *GLOBAL_LIMITER.lock().unwrap() = Some(Arc::clone(&limiter));
    Ok(limiter)
}

pub fn rate_limiter() -> Option<Arc<dyn RateLimiter>> {
    GLOBAL_LIMITER.lock().unwrap().clone()
}

/// Per-key deque of hit timestamps, trimmed to the window on every call.
pub struct InMemoryRateLimiter {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(HashMap::new()),
        }
    }

    fn hit_at(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
        now: Instant,
    ) -> Result<(), RateLimitError> {
        let mut requests = self.requests.lock().unwrap();
        let queue = requests.entry(key.to_string()).or_default();

        let window = Duration::from_secs(window_seconds);
        while let Some(front) = queue.front() {
            if now.duration_since(*front) >= window {
                queue.pop_front();
            } else {
                break;
            }
        }

        if queue.len() as u64 >= limit {
            return Err(RateLimitError::Limited);
        }
        queue.push_back(now);
        Ok(())
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn hit(&self, key: &str, limit: u64, window_seconds: u64) -> Result<(), RateLimitError> {
        self.hit_at(key, limit, window_seconds, Instant::now())
    }
}

// INCR and set the TTL on the first hit of the window; the counter expires
// with the window boundary.
const RATE_LIMIT_LUA: &str = r#"
local current = redis.call("INCR", KEYS[1])
if current == 1 then
  redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return current
"#;

/// Shared-counter backend for multi-process deployments. Backend errors are
/// `Unavailable`, not `Limited`; the callers fail closed with 503.
pub struct RedisRateLimiter {
    client: redis::Client,
    script: Script,
}

impl RedisRateLimiter {
    pub fn new(url: &str) -> Result<Self, CoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| CoreError::Internal(format!("Invalid redis URL: {e}")))?;
        Ok(Self {
            client,
            script: Script::new(RATE_LIMIT_LUA),
        })
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn hit(&self, key: &str, limit: u64, window_seconds: u64) -> Result<(), RateLimitError> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| RateLimitError::Unavailable)?;

        let current: i64 = self
            .script
            .key(key)
            .arg(window_seconds)
            .invoke_async(&mut conn)
            .await
            .map_err(|_| RateLimitError::Unavailable)?;

        if current as u64 > limit {
            return Err(RateLimitError::Limited);
        }
        Ok(())
    }
}
