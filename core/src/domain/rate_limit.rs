// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The fixed window for this key is full.
    #[error("Rate limit exceeded")]
    Limited,
    /// The backing counter store is unreachable. Policy here is fail
    /// closed: callers surface 503 rather than silently over-admitting.
    #[error("Rate limiter unavailable")]
    Unavailable,
}

/// Fixed-window counter keyed by `(route, client-identifier)`.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn hit(&self, key: &str, limit: u64, window_seconds: u64) -> Result<(), RateLimitError>;
}
