// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Auth glue: bearer-token extraction and the per-request rate-limit gate.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::domain::error::CoreError;
use crate::domain::rate_limit::RateLimitError;
use crate::domain::user::User;
use crate::infrastructure::rate_limit::rate_limiter;
use crate::presentation::api::AppState;

/// The authenticated user for a request. Rejection is a plain 401.
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = CoreError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| CoreError::Unauthorized("Not authenticated".to_string()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| CoreError::Unauthorized("Invalid token".to_string()))?;

        let user = state.auth_service().current_user(token).await?;
        Ok(CurrentUser(user))
    }
}

/// Best-effort client identity: first `x-forwarded-for` hop, if any.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Fixed-window gate keyed by `(route, client-ip)`. A missing limiter
/// (never initialized) admits everything; an unreachable backend fails
/// closed as 503.
pub async fn enforce_rate_limit(
    headers: &HeaderMap,
    route: &str,
    limit: u64,
    window_seconds: u64,
) -> Result<(), CoreError> {
    let Some(limiter) = rate_limiter() else {
        return Ok(());
    };
    let key = format!("{route}:{}", client_ip(headers));
    limiter
        .hit(&key, limit, window_seconds)
        .await
        .map_err(|err| match err {
            RateLimitError::Limited => CoreError::RateLimited,
            RateLimitError::Unavailable => {
                CoreError::Unavailable("Rate limiter unavailable".to_string())
            }
        })
}
