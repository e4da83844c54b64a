// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;
use uuid::Uuid;

use crate::domain::store::{StoreError, UserStore};
use crate::domain::user::{Role, User};

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = "id, email, username, display_name, hashed_password, avatar_url, \
                            role, is_active, cpu, disk, wallpaper, created_at, updated_at";

fn map_user_row(row: &sqlx::postgres::PgRow) -> Result<User, StoreError> {
    let get = |e: sqlx::Error| StoreError::Database(e.to_string());
    Ok(User {
        id: row.try_get("id").map_err(get)?,
        email: row.try_get("email").map_err(get)?,
        username: row.try_get("username").map_err(get)?,
        display_name: row.try_get("display_name").map_err(get)?,
        hashed_password: row.try_get("hashed_password").map_err(get)?,
        avatar_url: row.try_get("avatar_url").map_err(get)?,
        role: Role::parse(row.try_get::<String, _>("role").map_err(get)?.as_str()),
        is_active: row.try_get("is_active").map_err(get)?,
        cpu: row.try_get("cpu").map_err(get)?,
        disk: row.try_get("disk").map_err(get)?,
        wallpaper: row.try_get("wallpaper").map_err(get)?,
        created_at: row.try_get("created_at").map_err(get)?,
        updated_at: row.try_get("updated_at").map_err(get)?,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        row.as_ref().map(map_user_row).transpose()
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, email, username, display_name, hashed_password, avatar_url,
                 role, is_active, cpu, disk, wallpaper, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW(), NOW())
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.hashed_password)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.cpu)
        .bind(user.disk)
        .bind(&user.wallpaper)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::Conflict("email or username already registered".to_string())
            } else {
                StoreError::Database(e.to_string())
            }
        })?;

        Ok(())
    }
}
