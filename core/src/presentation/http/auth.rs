// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use axum::extract::{Multipart, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::application::auth::{
    LoginRequest, RegisterInput, RegisterResponse, TokenResponse, UserResponse,
    UsernameInfoResponse,
};
use crate::domain::error::CoreError;
use crate::presentation::api::AppState;
use crate::presentation::extract::{enforce_rate_limit, CurrentUser};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/username-info", get(username_info))
}

async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<RegisterResponse>), CoreError> {
    enforce_rate_limit(
        &headers,
        "/api/v1/auth/register",
        state.config.rate_limit_auth_per_minute,
        state.config.rate_limit_window_seconds,
    )
    .await?;

    let mut email = None;
    let mut username = None;
    let mut display_name = None;
    let mut password = None;
    let mut avatar_emoji = None;
    let mut beta_token = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| CoreError::Validation("Invalid multipart form".to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "email" => email = Some(read_text(field).await?),
            "username" => username = Some(read_text(field).await?),
            "display_name" => display_name = Some(read_text(field).await?),
            "password" => password = Some(read_text(field).await?),
            "avatar_emoji" => avatar_emoji = Some(read_text(field).await?),
            "beta_token" => beta_token = Some(read_text(field).await?),
            // Avatar file handling lives in an external upload service;
            // the field is drained and dropped here.
            "avatar" => {
                let _ = field.bytes().await;
            }
            _ => {}
        }
    }

    let input = RegisterInput {
        email: require(email, "email")?,
        username: require(username, "username")?,
        display_name: require(display_name, "display_name")?,
        password: require(password, "password")?,
        avatar_emoji: avatar_emoji.filter(|value| !value.is_empty()),
        beta_token: beta_token.filter(|value| !value.is_empty()),
    };

    let response = state.auth_service().register(input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, CoreError> {
    field
        .text()
        .await
        .map_err(|_| CoreError::Validation("Invalid multipart form".to_string()))
}

fn require(value: Option<String>, name: &str) -> Result<String, CoreError> {
    value.ok_or_else(|| CoreError::Validation(format!("{name} is required")))
}

async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(data): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, CoreError> {
    enforce_rate_limit(
        &headers,
        "/api/v1/auth/login",
        state.config.rate_limit_auth_per_minute,
        state.config.rate_limit_window_seconds,
    )
    .await?;

    let response = state.auth_service().login(data).await?;
    Ok(Json(response))
}

async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<UserResponse> {
    Json(state.auth_service().user_response(&user))
}

#[derive(Deserialize)]
struct UsernameInfoQuery {
    username: String,
}

async fn username_info(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<UsernameInfoQuery>,
) -> Result<Json<UsernameInfoResponse>, CoreError> {
    enforce_rate_limit(
        &headers,
        "/api/v1/auth/username-info",
        state.config.rate_limit_username_info_per_minute,
        state.config.rate_limit_window_seconds,
    )
    .await?;

    let response = state.auth_service().username_info(&query.username).await?;
    Ok(Json(response))
}
