// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Narrow store traits the core is written against.
//!
//! The metadata store is transactional: every VFS handler opens exactly one
//! [`NodeMetaTx`], performs its content-side work first, then its metadata
//! writes, and commits last. Dropping a transaction without committing
//! rolls it back, so a failed content operation can never leak metadata.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::container::{ContainerRecord, ContainerStatus};
use crate::domain::node::{NodeMetaPatch, NodeMetadata};
use crate::domain::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("{0}")]
    Conflict(String),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Insert a new account. A unique-constraint race on email/username
    /// surfaces as [`StoreError::Conflict`].
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
}

/// Fields written back to the one-per-user container record.
#[derive(Debug, Clone)]
pub struct ContainerUpsert {
    pub user_id: Uuid,
    pub container_id: Option<String>,
    pub container_name: String,
    pub container_ip: Option<String>,
    pub status: ContainerStatus,
    pub cpu_limit: i64,
    pub ram_limit: i64,
    pub disk_limit: i64,
    pub network_rate: String,
    pub started_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ContainerRecord>, StoreError>;
    /// Insert-or-update keyed by `user_id`. Concurrent provisions race on
    /// the unique `container_name`; the loser reconciles via re-inspect.
    async fn upsert(&self, record: &ContainerUpsert) -> Result<ContainerRecord, StoreError>;
    async fn append_event(
        &self,
        user_id: Uuid,
        event_type: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), StoreError>;
}

/// Single-use beta invite row, matched by token hash. Issuance and email
/// delivery are external; the core only validates and consumes.
#[derive(Debug, Clone)]
pub struct BetaAccessRequest {
    pub id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub token_expires_at: DateTime<Utc>,
    pub token_used_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait BetaAccessStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<BetaAccessRequest>, StoreError>;
    async fn mark_used(&self, id: Uuid) -> Result<(), StoreError>;
}

#[async_trait]
pub trait NodeMetaStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn NodeMetaTx>, StoreError>;
}

#[async_trait]
pub trait NodeMetaTx: Send {
    async fn find(&mut self, user_id: Uuid, path: &str) -> Result<Option<NodeMetadata>, StoreError>;

    /// Insert the row when absent, then apply the patch.
    async fn upsert(
        &mut self,
        user_id: Uuid,
        path: &str,
        name: &str,
        node_type: crate::domain::node::NodeType,
        patch: NodeMetaPatch,
    ) -> Result<NodeMetadata, StoreError>;

    async fn delete(&mut self, user_id: Uuid, path: &str) -> Result<(), StoreError>;

    /// Delete every row strictly below `prefix` (`prefix/…`).
    async fn delete_prefix(&mut self, user_id: Uuid, prefix: &str) -> Result<(), StoreError>;

    /// Rewrite `old_path` (and every row below it) to `new_path`, renaming
    /// the exact row to `new_name`.
    async fn rename_prefix(
        &mut self,
        user_id: Uuid,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<(), StoreError>;

    async fn list_trashed(&mut self, user_id: Uuid) -> Result<Vec<NodeMetadata>, StoreError>;

    async fn list_with_desktop_pos(&mut self, user_id: Uuid)
        -> Result<Vec<NodeMetadata>, StoreError>;

    /// Remove all trash rows for the user; returns how many were deleted.
    async fn delete_all_trash(&mut self, user_id: Uuid) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
