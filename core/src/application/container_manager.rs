// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Per-user container lifecycle.
//!
//! ```text
//!          ┌────────── creating ─────────┐
//! none ───>│                              │──> error
//!          └─ created/running <──> stopped┘
//! ```
//!
//! Every transition is persisted before the next engine call is dispatched.
//! There is no in-memory lock per user: concurrent provisions race on the
//! unique `container_name` constraint and the loser reconciles by
//! re-inspecting the engine.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::container_fs::EXEC_USER;
use crate::config::AppConfig;
use crate::domain::container::{event_type, ContainerRecord, ContainerStatus};
use crate::domain::error::CoreError;
use crate::domain::runtime::{ContainerRuntime, ContainerSpec, EngineStatus, RuntimeError};
use crate::domain::store::{ContainerStore, ContainerUpsert};
use crate::domain::user::container_name_for;

/// Subdirectories created under the user's host data directory.
const HOST_SUBDIRS: &[&str] = &[
    "Desktop",
    "Documents",
    "Downloads",
    "Pictures",
    "Music",
    "Videos",
    ".Trash",
    ".aisu",
];

/// The canonical empty layout of a (re)provisioned home directory. A fresh
/// container must present exactly these seven children at the VFS root.
const HOME_DIRS: &[&str] = &[
    "/home/aisu/Desktop",
    "/home/aisu/Documents",
    "/home/aisu/Downloads",
    "/home/aisu/Pictures",
    "/home/aisu/Music",
    "/home/aisu/Videos",
    "/home/aisu/.Trash",
];

pub const STOP_GRACE_SECONDS: i64 = 10;

#[derive(Debug, Clone)]
pub struct ContainerAction {
    pub status: String,
    pub message: String,
}

impl ContainerAction {
    fn new(status: &str, message: &str) -> Self {
        Self {
            status: status.to_string(),
            message: message.to_string(),
        }
    }

    /// True when this action (re)provisioned the container, i.e. callers
    /// should wait for readiness before attaching to it.
    pub fn provisioned(&self) -> bool {
        self.message.contains("provisioned")
    }
}

#[derive(Debug, Clone)]
pub struct LiveStatus {
    pub record: ContainerRecord,
    pub engine_status: String,
}

pub struct ContainerManager {
    config: Arc<AppConfig>,
    runtime: Arc<dyn ContainerRuntime>,
    store: Arc<dyn ContainerStore>,
}

impl ContainerManager {
    pub fn new(
        config: Arc<AppConfig>,
        runtime: Arc<dyn ContainerRuntime>,
        store: Arc<dyn ContainerStore>,
    ) -> Self {
        Self {
            config,
            runtime,
            store,
        }
    }

    /// Full provisioning: host directories → record in `creating` → engine
    /// create+start → record update. Engine failures land the record in
    /// `error` with an `error` event; the record is returned either way.
    pub async fn provision(
        &self,
        user_id: Uuid,
        cpu: i32,
        disk_mb: i32,
    ) -> Result<ContainerRecord, CoreError> {
        let ram_bytes = self.config.ram_bytes_for(cpu);
        let disk_bytes = i64::from(disk_mb) * 1024 * 1024;
        let name = container_name_for(user_id);

        let data_path = self.ensure_user_dirs(user_id).await?;

        let record = self
            .store
            .upsert(&ContainerUpsert {
                user_id,
                container_id: None,
                container_name: name.clone(),
                container_ip: None,
                status: ContainerStatus::Creating,
                cpu_limit: i64::from(cpu),
                ram_limit: ram_bytes,
                disk_limit: disk_bytes,
                network_rate: self.config.container_network_rate.clone(),
                started_at: None,
            })
            .await?;
        self.store
            .append_event(
                user_id,
                event_type::CREATING,
                Some(json!({ "cpu": cpu, "disk_mb": disk_mb })),
            )
            .await?;

        let spec = ContainerSpec {
            image: self.config.container_image.clone(),
            name: name.clone(),
            hostname: format!("aisu-{}", &user_id.to_string()[..8]),
            network: self.config.container_network.clone(),
            binds: vec![(
                data_path.display().to_string(),
                "/home/aisu/data".to_string(),
            )],
            cpu_period: self.config.container_cpu_period,
            cpu_quota: i64::from(cpu) * self.config.container_cpu_period,
            memory_bytes: ram_bytes,
            pids_limit: self.config.container_pids_limit,
            env: vec![("AISU_USER_ID".to_string(), user_id.to_string())],
            labels: vec![
                ("aisu.user_id".to_string(), user_id.to_string()),
                ("aisu.managed".to_string(), "true".to_string()),
            ],
            runtime: self.config.container_runtime.clone(),
        };

        match self.create_and_start(&spec).await {
            Ok((container_id, container_ip)) => {
                let updated = self
                    .store
                    .upsert(&ContainerUpsert {
                        container_id: container_id.clone(),
                        container_ip: container_ip.clone(),
                        status: ContainerStatus::Running,
                        started_at: Some(Utc::now()),
                        ..upsert_from(&record)
                    })
                    .await?;
                self.store
                    .append_event(
                        user_id,
                        event_type::CREATED,
                        Some(json!({
                            "container_id": container_id,
                            "container_ip": container_ip,
                        })),
                    )
                    .await?;
                self.seed_home_dirs(&name).await;
                info!(user = %user_id, container = %name, "container provisioned");
                Ok(updated)
            }
            Err(err) => {
                warn!(user = %user_id, container = %name, "provisioning failed: {err}");
                let updated = self
                    .store
                    .upsert(&ContainerUpsert {
                        status: ContainerStatus::Error,
                        ..upsert_from(&record)
                    })
                    .await?;
                self.store
                    .append_event(
                        user_id,
                        event_type::ERROR,
                        Some(json!({ "error": err.to_string() })),
                    )
                    .await?;
                Ok(updated)
            }
        }
    }

    /// Start (provisioning or re-provisioning when needed). Idempotent:
    /// starting a running container reports success without touching the
    /// engine state.
    pub async fn start(
        &self,
        user_id: Uuid,
        cpu: i32,
        disk_mb: i32,
    ) -> Result<ContainerAction, CoreError> {
        let Some(record) = self.store.find_by_user(user_id).await? else {
            let record = self.provision(user_id, cpu, disk_mb).await?;
            return Ok(ContainerAction::new(
                record.status.as_str(),
                "Container provisioned",
            ));
        };

        let name = record.container_name.clone();
        match self.runtime.inspect(&name).await {
            Ok(state) if state.status.is_running() => {
                if record.status != ContainerStatus::Running {
                    self.store
                        .upsert(&ContainerUpsert {
                            status: ContainerStatus::Running,
                            container_ip: state.ip,
                            ..upsert_from(&record)
                        })
                        .await?;
                }
                Ok(ContainerAction::new("running", "Container already running"))
            }
            Ok(_) => match self.runtime.start(&name).await {
                Ok(()) => {
                    let ip = self
                        .runtime
                        .inspect(&name)
                        .await
                        .ok()
                        .and_then(|state| state.ip);
                    self.store
                        .upsert(&ContainerUpsert {
                            status: ContainerStatus::Running,
                            container_ip: ip,
                            started_at: Some(Utc::now()),
                            ..upsert_from(&record)
                        })
                        .await?;
                    self.store
                        .append_event(user_id, event_type::STARTED, None)
                        .await?;
                    Ok(ContainerAction::new("running", "Container started"))
                }
                Err(err) => self.fail_start(user_id, &record, err).await,
            },
            Err(RuntimeError::NotFound(_)) => {
                warn!(user = %user_id, container = %name, "container missing in engine, re-provisioning");
                let record = self.provision(user_id, cpu, disk_mb).await?;
                Ok(ContainerAction::new(
                    record.status.as_str(),
                    "Container re-provisioned",
                ))
            }
            Err(err) => self.fail_start(user_id, &record, err).await,
        }
    }

    async fn fail_start(
        &self,
        user_id: Uuid,
        record: &ContainerRecord,
        err: RuntimeError,
    ) -> Result<ContainerAction, CoreError> {
        warn!(user = %user_id, "container start failed: {err}");
        self.store
            .upsert(&ContainerUpsert {
                status: ContainerStatus::Error,
                ..upsert_from(record)
            })
            .await?;
        self.store
            .append_event(
                user_id,
                event_type::ERROR,
                Some(json!({ "error": err.to_string() })),
            )
            .await?;
        Ok(ContainerAction::new("error", "Failed to start container"))
    }

    /// Idempotent stop with a SIGTERM grace period.
    pub async fn stop(&self, user_id: Uuid, grace_seconds: i64) -> Result<ContainerAction, CoreError> {
        let Some(record) = self.store.find_by_user(user_id).await? else {
            return Ok(ContainerAction::new("error", "Container not found"));
        };

        if record.status == ContainerStatus::Stopped {
            return Ok(ContainerAction::new("stopped", "Container already stopped"));
        }

        let name = record.container_name.clone();
        if let Ok(state) = self.runtime.inspect(&name).await {
            if !state.status.is_running() {
                self.store
                    .upsert(&ContainerUpsert {
                        status: ContainerStatus::Stopped,
                        ..upsert_from(&record)
                    })
                    .await?;
                return Ok(ContainerAction::new("stopped", "Container already stopped"));
            }
        }

        match self.runtime.stop(&name, grace_seconds).await {
            Ok(()) => {
                self.store
                    .upsert(&ContainerUpsert {
                        status: ContainerStatus::Stopped,
                        ..upsert_from(&record)
                    })
                    .await?;
                self.store
                    .append_event(user_id, event_type::STOPPED, None)
                    .await?;
                Ok(ContainerAction::new("stopped", "Container stopped"))
            }
            Err(err) => {
                warn!(user = %user_id, "container stop failed: {err}");
                self.store
                    .upsert(&ContainerUpsert {
                        status: ContainerStatus::Error,
                        ..upsert_from(&record)
                    })
                    .await?;
                Ok(ContainerAction::new("error", "Failed to stop container"))
            }
        }
    }

    /// Engine-truth status. When the engine disagrees with the persisted
    /// record, the engine wins and the record is updated.
    pub async fn live_status(&self, user_id: Uuid) -> Result<Option<LiveStatus>, CoreError> {
        let Some(record) = self.store.find_by_user(user_id).await? else {
            return Ok(None);
        };

        if record.container_id.is_none() {
            return Ok(Some(LiveStatus {
                record,
                engine_status: "unknown".to_string(),
            }));
        }

        match self.runtime.inspect(&record.container_name).await {
            Ok(state) => {
                let mapped = map_engine_status(state.status);
                let record = if mapped != record.status {
                    self.store
                        .upsert(&ContainerUpsert {
                            status: mapped,
                            container_ip: state.ip.clone().or(record.container_ip.clone()),
                            ..upsert_from(&record)
                        })
                        .await?
                } else {
                    record
                };
                Ok(Some(LiveStatus {
                    record,
                    engine_status: state.status.as_str().to_string(),
                }))
            }
            Err(err) => {
                warn!(user = %user_id, "live status inspect failed: {err}");
                Ok(Some(LiveStatus {
                    record,
                    engine_status: "unreachable".to_string(),
                }))
            }
        }
    }

    async fn create_and_start(
        &self,
        spec: &ContainerSpec,
    ) -> Result<(Option<String>, Option<String>), RuntimeError> {
        let container_id = match self.runtime.create(spec).await {
            Ok(id) => Some(id),
            // Name already taken: another provision won the race. Treat as
            // success-after-inspect and converge on the existing container.
            Err(RuntimeError::Conflict(_)) => None,
            Err(err) => return Err(err),
        };

        let state = self.runtime.inspect(&spec.name).await?;
        if !state.status.is_running() {
            self.runtime.start(&spec.name).await?;
        }
        let state = self.runtime.inspect(&spec.name).await?;
        Ok((container_id, state.ip))
    }

    /// Host-side data directory layout for one user.
    async fn ensure_user_dirs(&self, user_id: Uuid) -> Result<PathBuf, CoreError> {
        let base = PathBuf::from(&self.config.user_data_base_path).join(user_id.to_string());
        let created = tokio::task::spawn_blocking(move || -> std::io::Result<PathBuf> {
            for subdir in HOST_SUBDIRS {
                std::fs::create_dir_all(base.join(subdir))?;
            }
            base.canonicalize().or(Ok(base))
        })
        .await
        .map_err(|e| CoreError::Internal(format!("join error: {e}")))?
        .map_err(|e| CoreError::Internal(format!("Failed to create user directories: {e}")))?;
        Ok(created)
    }

    /// Make sure the canonical home layout exists inside the container.
    /// Best-effort: a failure here leaves an empty home, not a broken one.
    async fn seed_home_dirs(&self, container_name: &str) {
        let mut argv: Vec<String> = vec!["mkdir".to_string(), "-p".to_string()];
        argv.extend(HOME_DIRS.iter().map(|d| d.to_string()));
        if let Err(err) = self
            .runtime
            .exec_unary(container_name, &argv, EXEC_USER, &[])
            .await
        {
            warn!(container = %container_name, "failed to seed home directories: {err}");
        }
    }
}

fn upsert_from(record: &ContainerRecord) -> ContainerUpsert {
    ContainerUpsert {
        user_id: record.user_id,
        container_id: record.container_id.clone(),
        container_name: record.container_name.clone(),
        container_ip: record.container_ip.clone(),
        status: record.status,
        cpu_limit: record.cpu_limit,
        ram_limit: record.ram_limit,
        disk_limit: record.disk_limit,
        network_rate: record.network_rate.clone(),
        started_at: record.started_at,
    }
}

fn map_engine_status(status: EngineStatus) -> ContainerStatus {
    match status {
        EngineStatus::Running => ContainerStatus::Running,
        EngineStatus::Created | EngineStatus::Exited | EngineStatus::Paused => {
            ContainerStatus::Stopped
        }
        EngineStatus::Removing => ContainerStatus::Removed,
        EngineStatus::Restarting => ContainerStatus::Creating,
        EngineStatus::Dead | EngineStatus::Unknown => ContainerStatus::Error,
    }
}
