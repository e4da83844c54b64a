// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Capability boundary over the container engine.
//!
//! This trait is the *only* way any component talks to the engine. Both the
//! filesystem service and the terminal are written against it, which is what
//! allows the test harness to substitute a local-filesystem backend.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("container not found: {0}")]
    NotFound(String),
    #[error("name conflict: {0}")]
    Conflict(String),
    #[error("container engine unreachable: {0}")]
    Unavailable(String),
    #[error("container engine error: {0}")]
    Engine(String),
}

/// Everything the engine needs to create one user container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub hostname: String,
    pub network: String,
    /// host path → container path, mounted read-write.
    pub binds: Vec<(String, String)>,
    pub cpu_period: i64,
    pub cpu_quota: i64,
    pub memory_bytes: i64,
    pub pids_limit: i64,
    pub env: Vec<(String, String)>,
    pub labels: Vec<(String, String)>,
    /// Optional engine runtime name (e.g. a secure-container runtime).
    pub runtime: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Exited,
    Dead,
    Removing,
    Unknown,
}

impl EngineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineStatus::Created => "created",
            EngineStatus::Running => "running",
            EngineStatus::Paused => "paused",
            EngineStatus::Restarting => "restarting",
            EngineStatus::Exited => "exited",
            EngineStatus::Dead => "dead",
            EngineStatus::Removing => "removing",
            EngineStatus::Unknown => "unknown",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, EngineStatus::Running)
    }
}

/// Result of inspecting a container: live status plus the IP on the
/// configured network, when attached.
#[derive(Debug, Clone)]
pub struct ContainerState {
    pub status: EngineStatus,
    pub ip: Option<String>,
}

/// Output of a run-to-completion exec.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// Duplex exec channel. The reader yields empty bytes on EOF; the writer is
/// shut down on teardown. Resizing goes through the runtime by exec id
/// because the engine owns the PTY.
pub struct ExecChannel {
    pub exec_id: String,
    pub reader: Box<dyn ExecReader>,
    pub writer: Box<dyn ExecWriter>,
}

#[async_trait]
pub trait ExecReader: Send {
    /// Next chunk from the container. Empty bytes mean the stream ended.
    async fn read(&mut self) -> Result<Bytes, RuntimeError>;
}

#[async_trait]
pub trait ExecWriter: Send {
    async fn write(&mut self, data: &[u8]) -> Result<(), RuntimeError>;
    async fn shutdown(&mut self) -> Result<(), RuntimeError>;
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container. Idempotent by name: a name conflict surfaces as
    /// [`RuntimeError::Conflict`], which callers may treat as
    /// success-after-inspect.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    async fn start(&self, name: &str) -> Result<(), RuntimeError>;

    async fn stop(&self, name: &str, grace_seconds: i64) -> Result<(), RuntimeError>;

    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError>;

    async fn remove(&self, name: &str) -> Result<(), RuntimeError>;

    /// Last `lines` of the container's log output, for EOF attribution.
    async fn logs_tail(&self, name: &str, lines: usize) -> Result<String, RuntimeError>;

    /// Run `argv` to completion inside the container as `user`.
    async fn exec_unary(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        env: &[(String, String)],
    ) -> Result<ExecOutput, RuntimeError>;

    /// Open a duplex exec. Only the terminal uses this.
    async fn exec_stream(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        env: &[(String, String)],
        tty: bool,
        stdin: bool,
    ) -> Result<ExecChannel, RuntimeError>;

    async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError>;
}
