// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! HTTP mapping for the closed error set: each kind gets its status code
//! and a `{"detail": …}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domain::error::CoreError;

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::Validation(_) => StatusCode::BAD_REQUEST,
            CoreError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::Conflict(_) => StatusCode::CONFLICT,
            CoreError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            CoreError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            CoreError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            tracing::error!(status = %status, "request failed: {self}");
        }

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_contract() {
        let cases = [
            (CoreError::Validation("x".into()), 400),
            (CoreError::Unprocessable("x".into()), 422),
            (CoreError::Unauthorized("x".into()), 401),
            (CoreError::Forbidden("x".into()), 403),
            (CoreError::NotFound("x".into()), 404),
            (CoreError::Conflict("x".into()), 409),
            (CoreError::PayloadTooLarge("x".into()), 413),
            (CoreError::UnsupportedMedia("x".into()), 415),
            (CoreError::RateLimited, 429),
            (CoreError::Internal("x".into()), 500),
            (CoreError::Unavailable("x".into()), 503),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status().as_u16(), expected);
        }
    }
}
