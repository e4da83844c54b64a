// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::container::{ContainerRecord, ContainerStatus};
use crate::domain::store::{ContainerStore, ContainerUpsert, StoreError};

pub struct PgContainerStore {
    pool: PgPool,
}

impl PgContainerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CONTAINER_COLUMNS: &str = "user_id, container_id, container_name, container_ip, status, \
                                 cpu_limit, ram_limit, disk_limit, network_rate, started_at, \
                                 last_activity, created_at";

fn map_container_row(row: &sqlx::postgres::PgRow) -> Result<ContainerRecord, StoreError> {
    let get = |e: sqlx::Error| StoreError::Database(e.to_string());
    Ok(ContainerRecord {
        user_id: row.try_get("user_id").map_err(get)?,
        container_id: row.try_get("container_id").map_err(get)?,
        container_name: row.try_get("container_name").map_err(get)?,
        container_ip: row.try_get("container_ip").map_err(get)?,
        status: ContainerStatus::parse(row.try_get::<String, _>("status").map_err(get)?.as_str()),
        cpu_limit: row.try_get("cpu_limit").map_err(get)?,
        ram_limit: row.try_get("ram_limit").map_err(get)?,
        disk_limit: row.try_get("disk_limit").map_err(get)?,
        network_rate: row.try_get("network_rate").map_err(get)?,
        started_at: row.try_get("started_at").map_err(get)?,
        last_activity: row.try_get("last_activity").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
    })
}

#[async_trait]
impl ContainerStore for PgContainerStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<ContainerRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {CONTAINER_COLUMNS} FROM user_containers WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        row.as_ref().map(map_container_row).transpose()
    }

    async fn upsert(&self, record: &ContainerUpsert) -> Result<ContainerRecord, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO user_containers
                (id, user_id, container_id, container_name, container_ip, status,
                 cpu_limit, ram_limit, disk_limit, network_rate, started_at,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            ON CONFLICT (user_id) DO UPDATE SET
                container_id = EXCLUDED.container_id,
                container_ip = EXCLUDED.container_ip,
                status = EXCLUDED.status,
                cpu_limit = EXCLUDED.cpu_limit,
                ram_limit = EXCLUDED.ram_limit,
                disk_limit = EXCLUDED.disk_limit,
                network_rate = EXCLUDED.network_rate,
                started_at = EXCLUDED.started_at,
                updated_at = NOW()
            RETURNING {CONTAINER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(&record.container_id)
        .bind(&record.container_name)
        .bind(&record.container_ip)
        .bind(record.status.as_str())
        .bind(record.cpu_limit)
        .bind(record.ram_limit)
        .bind(record.disk_limit)
        .bind(&record.network_rate)
        .bind(record.started_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        map_container_row(&row)
    }

    async fn append_event(
        &self,
        user_id: Uuid,
        event_type: &str,
        details: Option<serde_json::Value>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO container_events (id, user_id, event_type, details, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(event_type)
        .bind(details)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
