// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem-node metadata that lives *outside* the container: desktop
//! positions and trash provenance. Content is owned by the container; these
//! rows survive re-provisioning, and rows whose path no longer stats are
//! simply not rendered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for the deterministic node-id derivation. Part of the API
/// contract: clients rely on ids being stable across reloads, so the id is
/// a pure function of `(user, path)` rather than a stored random value.
pub const NODE_ID_NAMESPACE: Uuid = Uuid::from_u128(0x9f2c_41d8_73ab_4e05_b6fa_02c8_5d1e_97a4);

/// `UUIDv5(namespace, "<user-id>:<vfs-path>")`. Identical for every call
/// with the same inputs; changes whenever the path changes (rename/move).
pub fn node_id(user_id: Uuid, path: &str) -> Uuid {
    Uuid::new_v5(&NODE_ID_NAMESPACE, format!("{user_id}:{path}").as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Directory,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Directory => "directory",
        }
    }

    pub fn parse(value: &str) -> NodeType {
        match value {
            "directory" => NodeType::Directory,
            _ => NodeType::File,
        }
    }
}

/// One metadata row, unique on `(user_id, path)`.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub user_id: Uuid,
    pub path: String,
    pub name: String,
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

/// Partial update applied by `upsert`. `None` leaves a column untouched;
/// `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default)]
pub struct NodeMetaPatch {
    pub name: Option<String>,
    pub node_type: Option<NodeType>,
    pub mime_type: Option<Option<String>>,
    pub size: Option<i64>,
    pub is_trashed: Option<bool>,
    pub original_path: Option<Option<String>>,
    pub trashed_at: Option<Option<DateTime<Utc>>>,
    pub desktop_x: Option<Option<i32>>,
    pub desktop_y: Option<Option<i32>>,
}

impl NodeMetadata {
    pub fn new(user_id: Uuid, path: &str, name: &str, node_type: NodeType) -> Self {
        let now = Utc::now();
        NodeMetadata {
            user_id,
            path: path.to_string(),
            name: name.to_string(),
            node_type,
            mime_type: None,
            size: 0,
            is_trashed: false,
            original_path: None,
            trashed_at: None,
            desktop_x: None,
            desktop_y: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: NodeMetaPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(node_type) = patch.node_type {
            self.node_type = node_type;
        }
        if let Some(mime_type) = patch.mime_type {
            self.mime_type = mime_type;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
        if let Some(is_trashed) = patch.is_trashed {
            self.is_trashed = is_trashed;
        }
        if let Some(original_path) = patch.original_path {
            self.original_path = original_path;
        }
        if let Some(trashed_at) = patch.trashed_at {
            self.trashed_at = trashed_at;
        }
        if let Some(desktop_x) = patch.desktop_x {
            self.desktop_x = desktop_x;
        }
        if let Some(desktop_y) = patch.desktop_y {
            self.desktop_y = desktop_y;
        }
        self.updated_at = Utc::now();
    }
}
