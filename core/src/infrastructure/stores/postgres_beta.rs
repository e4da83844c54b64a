// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::store::{BetaAccessRequest, BetaAccessStore, StoreError};

pub struct PgBetaAccessStore {
    pool: PgPool,
}

impl PgBetaAccessStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BetaAccessStore for PgBetaAccessStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<BetaAccessRequest>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, email, token_hash, token_expires_at, token_used_at
              FROM beta_access_requests
             WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };
        let get = |e: sqlx::Error| StoreError::Database(e.to_string());
        Ok(Some(BetaAccessRequest {
            id: row.try_get("id").map_err(get)?,
            email: row.try_get("email").map_err(get)?,
            token_hash: row.try_get("token_hash").map_err(get)?,
            token_expires_at: row.try_get("token_expires_at").map_err(get)?,
            token_used_at: row.try_get("token_used_at").map_err(get)?,
        }))
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE beta_access_requests SET token_used_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(())
    }
}
