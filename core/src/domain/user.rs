// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

/// One registered account. `cpu` and `disk` are the per-user container caps
/// (cores and MiB) applied at provision time.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub hashed_password: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub cpu: i32,
    pub disk: i32,
    pub wallpaper: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Deterministic engine-side container name. Never changes for the
    /// lifetime of the account.
    pub fn container_name(&self) -> String {
        container_name_for(self.id)
    }
}

pub fn container_name_for(user_id: Uuid) -> String {
    format!("aisu_{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_name_is_deterministic() {
        let id = Uuid::new_v4();
        assert_eq!(container_name_for(id), format!("aisu_{id}"));
        assert_eq!(container_name_for(id), container_name_for(id));
    }

    #[test]
    fn role_parse_defaults_to_user() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("user"), Role::User);
        assert_eq!(Role::parse("gibberish"), Role::User);
    }
}
