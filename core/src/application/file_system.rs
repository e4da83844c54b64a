// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! The outward VFS API: composes [`ContainerFs`] (content) with the
//! metadata store (desktop positions, trash provenance).
//!
//! Handler discipline, in order: validate, content-side work, metadata
//! writes, commit. The metadata transaction spans the whole handler, so a
//! failed content operation never leaves metadata behind.
//!
//! Unique naming is a universal invariant here: create/move/copy/restore
//! silently pick the first free `"<base> N"` (N ≥ 2) on collision. Rename
//! is the single exception: it fails with a conflict instead.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::container_fs::{ContainerFs, FsEntry, MAX_READ_SIZE, TRASH_PATH};
use crate::domain::error::CoreError;
use crate::domain::node::{node_id, NodeMetaPatch, NodeMetadata, NodeType};
use crate::domain::store::NodeMetaStore;
use crate::domain::vfs_path;

const TREE_MAX_DEPTH: u32 = 10;

// ── Requests ──

#[derive(Debug, Deserialize)]
pub struct CreateNodeRequest {
    pub parent_path: String,
    pub name: String,
    pub node_type: NodeType,
    pub mime_type: Option<String>,
    #[serde(default)]
    pub size: i64,
}

#[derive(Debug, Deserialize)]
pub struct RenameNodeRequest {
    pub path: String,
    pub new_name: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveNodeRequest {
    pub source_path: String,
    pub dest_parent_path: String,
}

#[derive(Debug, Deserialize)]
pub struct CopyNodeRequest {
    pub source_path: String,
    pub dest_parent_path: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteNodeRequest {
    pub path: String,
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Deserialize)]
pub struct RestoreNodeRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub paths: Vec<String>,
    #[serde(default)]
    pub permanent: bool,
}

#[derive(Debug, Deserialize)]
pub struct BulkMoveRequest {
    pub source_paths: Vec<String>,
    pub dest_parent_path: String,
}

#[derive(Debug, Deserialize)]
pub struct DesktopPositionItem {
    pub path: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Deserialize)]
pub struct BatchUpdateDesktopPositionsRequest {
    pub positions: Vec<DesktopPositionItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    Name,
    Size,
    CreatedAt,
    UpdatedAt,
}

impl SortBy {
    pub fn parse(value: &str) -> SortBy {
        match value {
            "size" => SortBy::Size,
            "created_at" => SortBy::CreatedAt,
            "updated_at" => SortBy::UpdatedAt,
            _ => SortBy::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    Asc,
    Desc,
}

impl SortDir {
    pub fn parse(value: &str) -> SortDir {
        match value {
            "desc" => SortDir::Desc,
            _ => SortDir::Asc,
        }
    }
}

// ── Responses ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResponse {
    pub id: Uuid,
    pub name: String,
    pub path: String,
    pub node_type: NodeType,
    pub mime_type: Option<String>,
    pub size: i64,
    pub is_trashed: bool,
    pub original_path: Option<String>,
    pub trashed_at: Option<DateTime<Utc>>,
    pub desktop_x: Option<i32>,
    pub desktop_y: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNodeResponse {
    #[serde(flatten)]
    pub node: NodeResponse,
    pub children: Vec<TreeNodeResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DirectoryListingResponse {
    pub path: String,
    pub node: NodeResponse,
    pub children: Vec<NodeResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MoveResultResponse {
    pub old_path: String,
    pub new_path: String,
    pub node: NodeResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CopyResultResponse {
    pub source_path: String,
    pub new_path: String,
    pub node: NodeResponse,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResultItem {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkResultResponse {
    pub succeeded: Vec<String>,
    pub failed: Vec<BulkResultItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileContentResponse {
    pub path: String,
    pub content: String,
    pub size: i64,
    pub encoding: String,
}

pub struct FileSystemService {
    user_id: Uuid,
    fs: ContainerFs,
    meta: Arc<dyn NodeMetaStore>,
}

impl FileSystemService {
    pub fn new(user_id: Uuid, fs: ContainerFs, meta: Arc<dyn NodeMetaStore>) -> Self {
        Self { user_id, fs, meta }
    }

    // ── Reads ──

    pub async fn get_tree(&self) -> Result<TreeNodeResponse, CoreError> {
        let root = self.fs.tree(TREE_MAX_DEPTH).await?;

        let mut tx = self.meta.begin().await?;
        let annotated = tx.list_with_desktop_pos(self.user_id).await?;
        tx.commit().await?;

        let positions: HashMap<String, (i32, i32)> = annotated
            .into_iter()
            .filter_map(|m| {
                let x = m.desktop_x?;
                let y = m.desktop_y?;
                Some((m.path, (x, y)))
            })
            .collect();

        Ok(self.tree_response(&root, &positions))
    }

    pub async fn get_node(&self, path: &str) -> Result<NodeResponse, CoreError> {
        let entry = self.stat_or_404(path).await?;

        let mut tx = self.meta.begin().await?;
        let meta = tx.find(self.user_id, path).await?;
        tx.commit().await?;

        Ok(self.node_response(&entry, meta.as_ref()))
    }

    pub async fn list_directory(
        &self,
        path: &str,
        sort_by: SortBy,
        sort_dir: SortDir,
    ) -> Result<DirectoryListingResponse, CoreError> {
        let parent = self.stat_or_404(path).await?;
        if parent.node_type != NodeType::Directory {
            return Err(CoreError::Validation("Not a directory".to_string()));
        }

        let mut children = self.fs.list(path).await?;
        sort_entries(&mut children, sort_by, sort_dir);

        let children: Vec<NodeResponse> = children
            .iter()
            .map(|entry| self.node_response(entry, None))
            .collect();

        Ok(DirectoryListingResponse {
            path: path.to_string(),
            node: self.node_response(&parent, None),
            total: children.len(),
            children,
        })
    }

    pub async fn search(
        &self,
        query: &str,
        scope: Option<&str>,
    ) -> Result<Vec<NodeResponse>, CoreError> {
        let entries = self.fs.search(query, scope.unwrap_or("/")).await?;
        Ok(entries
            .iter()
            .map(|entry| self.node_response(entry, None))
            .collect())
    }

    pub async fn read_file(&self, path: &str) -> Result<FileContentResponse, CoreError> {
        let content = self.fs.read_file(path, MAX_READ_SIZE).await?;
        Ok(FileContentResponse {
            path: path.to_string(),
            content: content.content,
            size: content.size,
            encoding: content.encoding,
        })
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<NodeResponse, CoreError> {
        self.fs.write_file(path, content).await?;
        let entry = self.stat_or_404(path).await?;
        Ok(self.node_response(&entry, None))
    }

    // ── Mutations ──

    pub async fn create_node(&self, data: CreateNodeRequest) -> Result<NodeResponse, CoreError> {
        vfs_path::validate(&data.parent_path)?;
        vfs_path::validate_name(&data.name)?;

        let parent = self.stat_or_404(&data.parent_path).await?;
        if parent.node_type != NodeType::Directory {
            return Err(CoreError::Validation(
                "Parent is not a directory".to_string(),
            ));
        }

        let unique = self
            .fs
            .generate_unique_name(&data.parent_path, &data.name)
            .await?;
        let new_path = vfs_path::join(&data.parent_path, &unique);

        match data.node_type {
            NodeType::File => self.fs.create_file(&new_path).await?,
            NodeType::Directory => self.fs.create_dir(&new_path).await?,
        }

        let mut entry = self.stat_or_500(&new_path).await?;
        if entry.mime_type.is_none() {
            entry.mime_type = data.mime_type;
        }
        Ok(self.node_response(&entry, None))
    }

    pub async fn rename_node(
        &self,
        data: RenameNodeRequest,
    ) -> Result<MoveResultResponse, CoreError> {
        vfs_path::validate(&data.path)?;
        if vfs_path::is_root(&data.path) {
            return Err(CoreError::Validation("Cannot rename root".to_string()));
        }
        vfs_path::validate_name(&data.new_name)?;

        self.stat_or_404(&data.path).await?;

        let parent = vfs_path::parent(&data.path);
        let new_path = vfs_path::join(&parent, &data.new_name);
        if self.fs.exists(&new_path).await? {
            return Err(CoreError::Conflict(format!(
                "Name already exists: {}",
                data.new_name
            )));
        }

        let mut tx = self.meta.begin().await?;
        self.fs.rename(&data.path, &new_path).await?;
        tx.rename_prefix(self.user_id, &data.path, &new_path, &data.new_name)
            .await?;
        tx.commit().await?;

        let entry = self.stat_or_500(&new_path).await?;
        Ok(MoveResultResponse {
            old_path: data.path,
            new_path,
            node: self.node_response(&entry, None),
        })
    }

    pub async fn move_node(&self, data: MoveNodeRequest) -> Result<MoveResultResponse, CoreError> {
        vfs_path::validate(&data.source_path)?;
        vfs_path::validate(&data.dest_parent_path)?;
        if vfs_path::is_root(&data.source_path) {
            return Err(CoreError::Validation("Cannot move root".to_string()));
        }
        if vfs_path::is_self_or_descendant(&data.dest_parent_path, &data.source_path) {
            return Err(CoreError::Validation(
                "Cannot move into itself or its descendant".to_string(),
            ));
        }

        self.stat_or_404(&data.source_path).await?;
        let dest = self.stat_or_404(&data.dest_parent_path).await?;
        if dest.node_type != NodeType::Directory {
            return Err(CoreError::Validation(
                "Destination is not a directory".to_string(),
            ));
        }

        let base = vfs_path::basename(&data.source_path);
        let unique = self
            .fs
            .generate_unique_name(&data.dest_parent_path, &base)
            .await?;

        let mut tx = self.meta.begin().await?;

        // When the destination already holds this name, rename in place
        // first so the move lands directly on the free name.
        let staged = if unique != base {
            let staged = vfs_path::join(&vfs_path::parent(&data.source_path), &unique);
            self.fs.rename(&data.source_path, &staged).await?;
            staged
        } else {
            data.source_path.clone()
        };

        let new_path = self.fs.move_into(&staged, &data.dest_parent_path).await?;
        tx.rename_prefix(self.user_id, &data.source_path, &new_path, &unique)
            .await?;
        tx.commit().await?;

        let entry = self.stat_or_500(&new_path).await?;
        Ok(MoveResultResponse {
            old_path: data.source_path,
            new_path,
            node: self.node_response(&entry, None),
        })
    }

    /// Recursive copy. Metadata is deliberately not copied: the new paths
    /// start life without annotations.
    pub async fn copy_node(&self, data: CopyNodeRequest) -> Result<CopyResultResponse, CoreError> {
        vfs_path::validate(&data.source_path)?;
        vfs_path::validate(&data.dest_parent_path)?;
        if vfs_path::is_root(&data.source_path) {
            return Err(CoreError::Validation("Cannot copy root".to_string()));
        }

        self.stat_or_404(&data.source_path).await?;
        let dest = self.stat_or_404(&data.dest_parent_path).await?;
        if dest.node_type != NodeType::Directory {
            return Err(CoreError::Validation(
                "Destination is not a directory".to_string(),
            ));
        }

        let base = vfs_path::basename(&data.source_path);
        let unique = self
            .fs
            .generate_unique_name(&data.dest_parent_path, &base)
            .await?;
        let new_path = self
            .fs
            .copy_to(&data.source_path, &data.dest_parent_path, &unique)
            .await?;

        let entry = self.stat_or_500(&new_path).await?;
        Ok(CopyResultResponse {
            source_path: data.source_path,
            new_path,
            node: self.node_response(&entry, None),
        })
    }

    pub async fn delete_node(&self, data: DeleteNodeRequest) -> Result<NodeResponse, CoreError> {
        vfs_path::validate(&data.path)?;
        if vfs_path::is_root(&data.path) {
            return Err(CoreError::Validation("Cannot delete root".to_string()));
        }

        let entry = self.stat_or_404(&data.path).await?;

        if data.permanent {
            let mut tx = self.meta.begin().await?;
            self.fs.delete(&data.path).await?;
            tx.delete(self.user_id, &data.path).await?;
            tx.delete_prefix(self.user_id, &data.path).await?;
            tx.commit().await?;
            return Ok(self.node_response(&entry, None));
        }

        let mut tx = self.meta.begin().await?;
        let trash_path = self.fs.move_to_trash(&data.path).await?;
        let meta = tx
            .upsert(
                self.user_id,
                &trash_path,
                &vfs_path::basename(&trash_path),
                entry.node_type,
                NodeMetaPatch {
                    mime_type: Some(entry.mime_type.clone()),
                    size: Some(entry.size),
                    is_trashed: Some(true),
                    original_path: Some(Some(data.path.clone())),
                    trashed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await?;
        tx.delete(self.user_id, &data.path).await?;
        tx.commit().await?;

        let trashed_entry = self.stat_or_500(&trash_path).await?;
        Ok(self.node_response(&trashed_entry, Some(&meta)))
    }

    /// Per-item loop; one failed path never aborts the rest. Each item
    /// commits on its own so a failure cannot poison its siblings.
    pub async fn bulk_delete(&self, data: BulkDeleteRequest) -> Result<BulkResultResponse, CoreError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for path in data.paths {
            match self
                .delete_node(DeleteNodeRequest {
                    path: path.clone(),
                    permanent: data.permanent,
                })
                .await
            {
                Ok(_) => succeeded.push(path),
                Err(err) => failed.push(BulkResultItem {
                    path,
                    error: err.to_string(),
                }),
            }
        }

        Ok(BulkResultResponse { succeeded, failed })
    }

    pub async fn bulk_move(&self, data: BulkMoveRequest) -> Result<BulkResultResponse, CoreError> {
        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        for path in data.source_paths {
            match self
                .move_node(MoveNodeRequest {
                    source_path: path.clone(),
                    dest_parent_path: data.dest_parent_path.clone(),
                })
                .await
            {
                Ok(_) => succeeded.push(path),
                Err(err) => failed.push(BulkResultItem {
                    path,
                    error: err.to_string(),
                }),
            }
        }

        Ok(BulkResultResponse { succeeded, failed })
    }

    // ── Trash ──

    pub async fn list_trash(&self) -> Result<Vec<NodeResponse>, CoreError> {
        self.fs.create_dir(TRASH_PATH).await?;
        let entries = self.fs.list(TRASH_PATH).await?;

        let mut tx = self.meta.begin().await?;
        let trashed = tx.list_trashed(self.user_id).await?;
        tx.commit().await?;

        let by_path: HashMap<&str, &NodeMetadata> =
            trashed.iter().map(|m| (m.path.as_str(), m)).collect();

        Ok(entries
            .iter()
            .map(|entry| {
                let mut response =
                    self.node_response(entry, by_path.get(entry.path.as_str()).copied());
                response.is_trashed = true;
                response
            })
            .collect())
    }

    pub async fn restore_node(
        &self,
        data: RestoreNodeRequest,
    ) -> Result<MoveResultResponse, CoreError> {
        vfs_path::validate(&data.path)?;

        let mut tx = self.meta.begin().await?;
        let meta = tx
            .find(self.user_id, &data.path)
            .await?
            .filter(|m| m.is_trashed)
            .ok_or_else(|| CoreError::NotFound(format!("Trashed node not found: {}", data.path)))?;

        let original_path = meta.original_path.clone().ok_or_else(|| {
            CoreError::Validation("Original path unknown, cannot restore".to_string())
        })?;

        let target_parent = vfs_path::parent(&original_path);
        if !self.fs.exists(&target_parent).await? {
            self.fs.create_dir(&target_parent).await?;
        }

        let base = vfs_path::basename(&original_path);
        let unique = self.fs.generate_unique_name(&target_parent, &base).await?;

        let staged = if unique != vfs_path::basename(&data.path) {
            let staged = vfs_path::join(&vfs_path::parent(&data.path), &unique);
            self.fs.rename(&data.path, &staged).await?;
            staged
        } else {
            data.path.clone()
        };

        let new_path = self.fs.move_into(&staged, &target_parent).await?;
        tx.delete(self.user_id, &data.path).await?;
        tx.commit().await?;

        let entry = self.stat_or_500(&new_path).await?;
        Ok(MoveResultResponse {
            old_path: data.path,
            new_path,
            node: self.node_response(&entry, None),
        })
    }

    /// Returns the number of removed top-level entries.
    pub async fn empty_trash(&self) -> Result<u64, CoreError> {
        let mut tx = self.meta.begin().await?;
        let deleted = self.fs.empty_trash().await?;
        tx.delete_all_trash(self.user_id).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    // ── Desktop positions ──

    pub async fn update_desktop_positions(
        &self,
        data: BatchUpdateDesktopPositionsRequest,
    ) -> Result<Vec<NodeResponse>, CoreError> {
        let mut tx = self.meta.begin().await?;
        let mut updated = Vec::new();

        for item in data.positions {
            vfs_path::validate(&item.path)?;
            // Vanished paths (stale desktop state on the client) are skipped.
            let Some(entry) = self.fs.stat(&item.path).await? else {
                continue;
            };
            let meta = tx
                .upsert(
                    self.user_id,
                    &item.path,
                    &entry.name,
                    entry.node_type,
                    NodeMetaPatch {
                        desktop_x: Some(Some(item.x)),
                        desktop_y: Some(Some(item.y)),
                        ..Default::default()
                    },
                )
                .await?;
            updated.push(self.node_response(&entry, Some(&meta)));
        }

        tx.commit().await?;
        Ok(updated)
    }

    // ── Helpers ──

    async fn stat_or_404(&self, path: &str) -> Result<FsEntry, CoreError> {
        self.fs
            .stat(path)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Node not found: {path}")))
    }

    async fn stat_or_500(&self, path: &str) -> Result<FsEntry, CoreError> {
        self.fs
            .stat(path)
            .await?
            .ok_or_else(|| CoreError::Internal(format!("Node vanished after operation: {path}")))
    }

    fn node_response(&self, entry: &FsEntry, meta: Option<&NodeMetadata>) -> NodeResponse {
        NodeResponse {
            id: node_id(self.user_id, &entry.path),
            name: entry.name.clone(),
            path: entry.path.clone(),
            node_type: entry.node_type,
            mime_type: entry.mime_type.clone(),
            size: entry.size,
            is_trashed: meta.map(|m| m.is_trashed).unwrap_or(false),
            original_path: meta.and_then(|m| m.original_path.clone()),
            trashed_at: meta.and_then(|m| m.trashed_at),
            desktop_x: meta.and_then(|m| m.desktop_x),
            desktop_y: meta.and_then(|m| m.desktop_y),
            created_at: timestamp(entry.ctime),
            updated_at: timestamp(entry.mtime),
        }
    }

    fn tree_response(
        &self,
        entry: &FsEntry,
        positions: &HashMap<String, (i32, i32)>,
    ) -> TreeNodeResponse {
        let mut node = self.node_response(entry, None);
        if let Some((x, y)) = positions.get(&entry.path) {
            node.desktop_x = Some(*x);
            node.desktop_y = Some(*y);
        }
        TreeNodeResponse {
            node,
            children: entry
                .children
                .iter()
                .map(|child| self.tree_response(child, positions))
                .collect(),
        }
    }
}

fn sort_entries(entries: &mut [FsEntry], sort_by: SortBy, sort_dir: SortDir) {
    entries.sort_by(|a, b| {
        let ordering = match sort_by {
            SortBy::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortBy::Size => a.size.cmp(&b.size),
            SortBy::CreatedAt => a.ctime.partial_cmp(&b.ctime).unwrap_or(Ordering::Equal),
            SortBy::UpdatedAt => a.mtime.partial_cmp(&b.mtime).unwrap_or(Ordering::Equal),
        };
        match sort_dir {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    });
}

fn timestamp(epoch_seconds: f64) -> DateTime<Utc> {
    let clamped = epoch_seconds.max(0.0);
    let secs = clamped.trunc() as i64;
    let nanos = ((clamped - clamped.trunc()) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now)
}
