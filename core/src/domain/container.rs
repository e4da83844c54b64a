// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Persisted container state: one record per user plus an append-only event
//! log. The record mirrors what the engine last told us; `live_status`
//! reconciliation in the manager keeps it honest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerStatus {
    Creating,
    Running,
    Stopped,
    Error,
    Removed,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Creating => "creating",
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Error => "error",
            ContainerStatus::Removed => "removed",
        }
    }

    pub fn parse(value: &str) -> ContainerStatus {
        match value {
            "creating" => ContainerStatus::Creating,
            "running" => ContainerStatus::Running,
            "stopped" => ContainerStatus::Stopped,
            "removed" => ContainerStatus::Removed,
            _ => ContainerStatus::Error,
        }
    }
}

/// One-to-one with a user. `container_id` stays null until the first
/// successful engine create; `container_name` never changes.
#[derive(Debug, Clone)]
pub struct ContainerRecord {
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
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit entry. Purely observational: no reads drive control
/// flow.
#[derive(Debug, Clone)]
pub struct ContainerEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_type: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

pub mod event_type {
    pub const CREATING: &str = "creating";
    pub const CREATED: &str = "created";
    pub const STARTED: &str = "started";
    pub const STOPPED: &str = "stopped";
    pub const ERROR: &str = "error";
}
