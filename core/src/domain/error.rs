// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Closed error set that flows across component boundaries.
//!
//! Every service raises one of these kinds; the presentation layer owns the
//! mapping to HTTP status codes (`{"detail": …}` bodies). The terminal path
//! never maps to HTTP; errors become structured JSON frames instead.

use thiserror::Error;

use crate::domain::runtime::RuntimeError;
use crate::domain::store::StoreError;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Input shape or path-safety violation → 400.
    #[error("{0}")]
    Validation(String),

    /// Semantically invalid entity (e.g. malformed email) → 422.
    #[error("{0}")]
    Unprocessable(String),

    /// Absent or invalid credentials → 401.
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed → 403.
    #[error("{0}")]
    Forbidden(String),

    /// User or node does not exist → 404.
    #[error("{0}")]
    NotFound(String),

    /// Unique-name rename, duplicate email/username → 409.
    #[error("{0}")]
    Conflict(String),

    /// File read above the configured cap → 413.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Non-UTF-8 file opened as text → 415.
    #[error("{0}")]
    UnsupportedMedia(String),

    /// Fixed-window limit exceeded → 429.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Engine failure, unparseable in-container program output → 500.
    #[error("{0}")]
    Internal(String),

    /// Engine or rate-limiter backend unreachable → 503.
    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::Database(msg) => CoreError::Internal(msg),
        }
    }
}

impl From<RuntimeError> for CoreError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound(msg) => CoreError::NotFound(msg),
            RuntimeError::Conflict(msg) => CoreError::Conflict(msg),
            RuntimeError::Unavailable(msg) => CoreError::Unavailable(msg),
            RuntimeError::Engine(msg) => CoreError::Internal(msg),
        }
    }
}
