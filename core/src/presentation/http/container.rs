// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::application::container_manager::{LiveStatus, STOP_GRACE_SECONDS};
use crate::domain::error::CoreError;
use crate::presentation::api::AppState;
use crate::presentation::extract::CurrentUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/restart", post(restart))
}

#[derive(Serialize)]
struct ContainerStatusResponse {
    user_id: Uuid,
    container_id: Option<String>,
    container_name: String,
    container_ip: Option<String>,
    status: String,
    engine_status: String,
    cpu_limit: i64,
    ram_limit: i64,
    disk_limit: i64,
    network_rate: String,
    started_at: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<LiveStatus> for ContainerStatusResponse {
    fn from(live: LiveStatus) -> Self {
        let record = live.record;
        ContainerStatusResponse {
            user_id: record.user_id,
            container_id: record.container_id,
            container_name: record.container_name,
            container_ip: record.container_ip,
            status: record.status.as_str().to_string(),
            engine_status: live.engine_status,
            cpu_limit: record.cpu_limit,
            ram_limit: record.ram_limit,
            disk_limit: record.disk_limit,
            network_rate: record.network_rate,
            started_at: record.started_at,
            last_activity: record.last_activity,
            created_at: record.created_at,
        }
    }
}

#[derive(Serialize)]
struct ContainerActionResponse {
    status: String,
    message: String,
}

async fn status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ContainerStatusResponse>, CoreError> {
    let live = state
        .container_manager()
        .live_status(user.id)
        .await?
        .ok_or_else(|| CoreError::NotFound("Container not found".to_string()))?;
    Ok(Json(live.into()))
}

async fn start(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ContainerActionResponse>, CoreError> {
    let action = state
        .container_manager()
        .start(user.id, user.cpu, user.disk)
        .await?;
    Ok(Json(ContainerActionResponse {
        status: action.status,
        message: action.message,
    }))
}

async fn stop(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ContainerActionResponse>, CoreError> {
    let action = state
        .container_manager()
        .stop(user.id, STOP_GRACE_SECONDS)
        .await?;
    Ok(Json(ContainerActionResponse {
        status: action.status,
        message: action.message,
    }))
}

async fn restart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<ContainerActionResponse>, CoreError> {
    let manager = state.container_manager();
    manager.stop(user.id, STOP_GRACE_SECONDS).await?;
    let action = manager.start(user.id, user.cpu, user.disk).await?;
    Ok(Json(ContainerActionResponse {
        status: action.status,
        message: action.message,
    }))
}
