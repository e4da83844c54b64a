// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! `/fs` routes. Every handler requires a running container (unless the
//! dev escape hatch disables the gate) and delegates to
//! [`FileSystemService`].

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::application::file_system::{
    BatchUpdateDesktopPositionsRequest, BulkDeleteRequest, BulkMoveRequest, BulkResultResponse,
    CopyNodeRequest, CopyResultResponse, CreateNodeRequest, DeleteNodeRequest,
    DirectoryListingResponse, FileContentResponse, FileSystemService, MoveNodeRequest,
    MoveResultResponse, NodeResponse, RenameNodeRequest, RestoreNodeRequest, SortBy, SortDir,
    TreeNodeResponse,
};
use crate::domain::error::CoreError;
use crate::domain::user::User;
use crate::presentation::api::AppState;
use crate::presentation::extract::CurrentUser;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tree", get(get_tree))
        .route("/node", get(get_node).post(create_node))
        .route("/ls", get(list_directory))
        .route("/rename", patch(rename_node))
        .route("/move", post(move_node))
        .route("/copy", post(copy_node))
        .route("/delete", post(delete_node))
        .route("/bulk-delete", post(bulk_delete))
        .route("/bulk-move", post(bulk_move))
        .route("/trash", get(list_trash))
        .route("/restore", post(restore_node))
        .route("/empty-trash", post(empty_trash))
        .route("/desktop-positions", patch(update_desktop_positions))
        .route("/search", get(search))
        .route("/read", get(read_file))
        .route("/write", post(write_file))
}

/// The filesystem only exists while the container runs; everything here
/// is 503 until it does.
async fn service(state: &AppState, user: &User) -> Result<FileSystemService, CoreError> {
    if state.config.container_enabled {
        let name = user.container_name();
        match state.runtime.inspect(&name).await {
            Ok(container) if container.status.is_running() => {}
            Ok(_) => {
                return Err(CoreError::Unavailable(
                    "Container is not running. Start your system first.".to_string(),
                ))
            }
            Err(_) => {
                return Err(CoreError::Unavailable(
                    "Container not found. Start your system first.".to_string(),
                ))
            }
        }
    }
    Ok(state.file_system(user))
}

#[derive(Deserialize)]
struct PathQuery {
    path: String,
}

#[derive(Deserialize)]
struct ListQuery {
    path: String,
    sort_by: Option<String>,
    sort_dir: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
    path: Option<String>,
}

#[derive(Deserialize)]
struct WriteFileRequest {
    path: String,
    content: String,
}

async fn get_tree(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<TreeNodeResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.get_tree().await?))
}

async fn get_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PathQuery>,
) -> Result<Json<NodeResponse>, CoreError> {
    Ok(Json(
        service(&state, &user).await?.get_node(&query.path).await?,
    ))
}

async fn list_directory(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<DirectoryListingResponse>, CoreError> {
    let sort_by = SortBy::parse(query.sort_by.as_deref().unwrap_or("name"));
    let sort_dir = SortDir::parse(query.sort_dir.as_deref().unwrap_or("asc"));
    Ok(Json(
        service(&state, &user)
            .await?
            .list_directory(&query.path, sort_by, sort_dir)
            .await?,
    ))
}

async fn create_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<CreateNodeRequest>,
) -> Result<(StatusCode, Json<NodeResponse>), CoreError> {
    let node = service(&state, &user).await?.create_node(data).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn rename_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<RenameNodeRequest>,
) -> Result<Json<MoveResultResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.rename_node(data).await?))
}

async fn move_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<MoveNodeRequest>,
) -> Result<Json<MoveResultResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.move_node(data).await?))
}

async fn copy_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<CopyNodeRequest>,
) -> Result<Json<CopyResultResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.copy_node(data).await?))
}

async fn delete_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<DeleteNodeRequest>,
) -> Result<Json<NodeResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.delete_node(data).await?))
}

async fn bulk_delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<BulkDeleteRequest>,
) -> Result<Json<BulkResultResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.bulk_delete(data).await?))
}

async fn bulk_move(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<BulkMoveRequest>,
) -> Result<Json<BulkResultResponse>, CoreError> {
    Ok(Json(service(&state, &user).await?.bulk_move(data).await?))
}

async fn list_trash(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<NodeResponse>>, CoreError> {
    Ok(Json(service(&state, &user).await?.list_trash().await?))
}

async fn restore_node(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<RestoreNodeRequest>,
) -> Result<Json<MoveResultResponse>, CoreError> {
    Ok(Json(
        service(&state, &user).await?.restore_node(data).await?,
    ))
}

async fn empty_trash(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, CoreError> {
    let deleted = service(&state, &user).await?.empty_trash().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn update_desktop_positions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<BatchUpdateDesktopPositionsRequest>,
) -> Result<Json<Vec<NodeResponse>>, CoreError> {
    Ok(Json(
        service(&state, &user)
            .await?
            .update_desktop_positions(data)
            .await?,
    ))
}

async fn search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<NodeResponse>>, CoreError> {
    Ok(Json(
        service(&state, &user)
            .await?
            .search(&query.q, query.path.as_deref())
            .await?,
    ))
}

async fn read_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PathQuery>,
) -> Result<Json<FileContentResponse>, CoreError> {
    Ok(Json(
        service(&state, &user).await?.read_file(&query.path).await?,
    ))
}

async fn write_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(data): Json<WriteFileRequest>,
) -> Result<Json<NodeResponse>, CoreError> {
    Ok(Json(
        service(&state, &user)
            .await?
            .write_file(&data.path, &data.content)
            .await?,
    ))
}
