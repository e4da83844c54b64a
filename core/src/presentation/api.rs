// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Router assembly and shared application state.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::auth::AuthService;
use crate::application::container_fs::ContainerFs;
use crate::application::container_manager::ContainerManager;
use crate::application::file_system::FileSystemService;
use crate::config::AppConfig;
use crate::domain::runtime::ContainerRuntime;
use crate::domain::store::{BetaAccessStore, ContainerStore, NodeMetaStore, UserStore};
use crate::domain::user::User;
use crate::presentation::http;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub containers: Arc<dyn ContainerStore>,
    pub node_meta: Arc<dyn NodeMetaStore>,
    pub beta: Arc<dyn BetaAccessStore>,
    pub runtime: Arc<dyn ContainerRuntime>,
}

impl AppState {
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            Arc::clone(&self.config),
            Arc::clone(&self.users),
            Arc::clone(&self.beta),
        )
    }

    pub fn container_manager(&self) -> ContainerManager {
        ContainerManager::new(
            Arc::clone(&self.config),
            Arc::clone(&self.runtime),
            Arc::clone(&self.containers),
        )
    }

    pub fn file_system(&self, user: &User) -> FileSystemService {
        let fs = ContainerFs::new(Arc::clone(&self.runtime), user.container_name());
        FileSystemService::new(user.id, fs, Arc::clone(&self.node_meta))
    }
}

pub fn app(state: AppState) -> Router {
    let cors = build_cors(&state.config);

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .route("/health", get(health))
                .nest("/auth", http::auth::routes())
                .nest("/container", http::container::routes())
                .nest("/fs", http::fs::routes()),
        )
        .route("/ws/terminal", get(http::terminal::terminal_ws))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

fn build_cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
