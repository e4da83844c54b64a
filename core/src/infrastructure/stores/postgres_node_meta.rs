// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Transactional Postgres implementation of the node-metadata store.
//!
//! All hierarchy is computed by prefix queries on `path`; there are no
//! parent pointers. The `(user_id, path)` pair is unique.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::node::{NodeMetaPatch, NodeMetadata, NodeType};
use crate::domain::store::{NodeMetaStore, NodeMetaTx, StoreError};

pub struct PgNodeMetaStore {
    pool: PgPool,
}

impl PgNodeMetaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeMetaStore for PgNodeMetaStore {
    async fn begin(&self) -> Result<Box<dyn NodeMetaTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Box::new(PgNodeMetaTx { tx }))
    }
}

pub struct PgNodeMetaTx {
    tx: Transaction<'static, Postgres>,
}

const NODE_COLUMNS: &str = "user_id, path, name, node_type, mime_type, size, is_trashed, \
                            original_path, trashed_at, desktop_x, desktop_y, created_at, \
                            updated_at";

fn map_node_row(row: &sqlx::postgres::PgRow) -> Result<NodeMetadata, StoreError> {
    let get = |e: sqlx::Error| StoreError::Database(e.to_string());
    Ok(NodeMetadata {
        user_id: row.try_get("user_id").map_err(get)?,
        path: row.try_get("path").map_err(get)?,
        name: row.try_get("name").map_err(get)?,
        node_type: NodeType::parse(row.try_get::<String, _>("node_type").map_err(get)?.as_str()),
        mime_type: row.try_get("mime_type").map_err(get)?,
        size: row.try_get("size").map_err(get)?,
        is_trashed: row.try_get("is_trashed").map_err(get)?,
        original_path: row.try_get("original_path").map_err(get)?,
        trashed_at: row.try_get("trashed_at").map_err(get)?,
        desktop_x: row.try_get("desktop_x").map_err(get)?,
        desktop_y: row.try_get("desktop_y").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

impl PgNodeMetaTx {
    async fn find_row(
        &mut self,
        user_id: Uuid,
        path: &str,
    ) -> Result<Option<NodeMetadata>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM file_system_nodes WHERE user_id = $1 AND path = $2"
        ))
        .bind(user_id)
        .bind(path)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        row.as_ref().map(map_node_row).transpose()
    }

    async fn write_full(&mut self, meta: &NodeMetadata, insert: bool) -> Result<(), StoreError> {
        if insert {
            sqlx::query(
                r#"
                INSERT INTO file_system_nodes
                    (id, user_id, path, name, node_type, mime_type, size, is_trashed,
                     original_path, trashed_at, desktop_x, desktop_y, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(meta.user_id)
            .bind(&meta.path)
            .bind(&meta.name)
            .bind(meta.node_type.as_str())
            .bind(&meta.mime_type)
            .bind(meta.size)
            .bind(meta.is_trashed)
            .bind(&meta.original_path)
            .bind(meta.trashed_at)
            .bind(meta.desktop_x)
            .bind(meta.desktop_y)
            .bind(meta.created_at)
            .bind(meta.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        } else {
            sqlx::query(
                r#"
                UPDATE file_system_nodes
                   SET name = $3, node_type = $4, mime_type = $5, size = $6,
                       is_trashed = $7, original_path = $8, trashed_at = $9,
                       desktop_x = $10, desktop_y = $11, updated_at = $12
                 WHERE user_id = $1 AND path = $2
                "#,
            )
            .bind(meta.user_id)
            .bind(&meta.path)
            .bind(&meta.name)
            .bind(meta.node_type.as_str())
            .bind(&meta.mime_type)
            .bind(meta.size)
            .bind(meta.is_trashed)
            .bind(&meta.original_path)
            .bind(meta.trashed_at)
            .bind(meta.desktop_x)
            .bind(meta.desktop_y)
            .bind(meta.updated_at)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }
        Ok(())
    }

    async fn list_where(&mut self, clause: &str, user_id: Uuid) -> Result<Vec<NodeMetadata>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM file_system_nodes WHERE user_id = $1 AND {clause}"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        rows.iter().map(map_node_row).collect()
    }
}

#[async_trait]
impl NodeMetaTx for PgNodeMetaTx {
    async fn find(&mut self, user_id: Uuid, path: &str) -> Result<Option<NodeMetadata>, StoreError> {
        self.find_row(user_id, path).await
    }

    async fn upsert(
        &mut self,
        user_id: Uuid,
        path: &str,
        name: &str,
        node_type: NodeType,
        patch: NodeMetaPatch,
    ) -> Result<NodeMetadata, StoreError> {
        match self.find_row(user_id, path).await? {
            Some(mut meta) => {
                meta.apply(patch);
                self.write_full(&meta, false).await?;
                Ok(meta)
            }
            None => {
                let mut meta = NodeMetadata::new(user_id, path, name, node_type);
                meta.apply(patch);
                self.write_full(&meta, true).await?;
                Ok(meta)
            }
        }
    }

    async fn delete(&mut self, user_id: Uuid, path: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM file_system_nodes WHERE user_id = $1 AND path = $2")
            .bind(user_id)
            .bind(path)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn delete_prefix(&mut self, user_id: Uuid, prefix: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM file_system_nodes WHERE user_id = $1 AND path LIKE $2")
            .bind(user_id)
            .bind(format!("{prefix}/%"))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn rename_prefix(
        &mut self,
        user_id: Uuid,
        old_path: &str,
        new_path: &str,
        new_name: &str,
    ) -> Result<(), StoreError> {
        if old_path == new_path {
            return Ok(());
        }
        sqlx::query(
            r#"
            UPDATE file_system_nodes
               SET path = $3 || substr(path, char_length($2) + 1),
                   name = CASE WHEN path = $2 THEN $4 ELSE name END,
                   updated_at = NOW()
             WHERE user_id = $1 AND (path = $2 OR path LIKE $5)
            "#,
        )
        .bind(user_id)
        .bind(old_path)
        .bind(new_path)
        .bind(new_name)
        .bind(format!("{old_path}/%"))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }

    async fn list_trashed(&mut self, user_id: Uuid) -> Result<Vec<NodeMetadata>, StoreError> {
        self.list_where("is_trashed = TRUE", user_id).await
    }

    async fn list_with_desktop_pos(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<NodeMetadata>, StoreError> {
        self.list_where("desktop_x IS NOT NULL AND desktop_y IS NOT NULL", user_id)
            .await
    }

    async fn delete_all_trash(&mut self, user_id: Uuid) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM file_system_nodes WHERE user_id = $1 AND is_trashed = TRUE")
                .bind(user_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
