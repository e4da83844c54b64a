// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Docker implementation of the [`ContainerRuntime`] capability set.
//!
//! This is the only module that talks to the engine. The handle is cheap to
//! clone; a fresh API call borrows the same underlying connection pool.

use std::collections::HashMap;
use std::pin::Pin;

use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::exec::{CreateExecOptions, ResizeExecOptions, StartExecOptions, StartExecResults};
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::Docker;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::info;

use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, EngineStatus, ExecChannel, ExecOutput,
    ExecReader, ExecWriter, RuntimeError,
};

pub struct DockerRuntime {
    docker: Docker,
    network: String,
}

impl DockerRuntime {
    /// Connect to the engine at `base_url` (`unix://…` or `http://…`;
    /// anything else falls back to the platform defaults).
    pub fn connect(base_url: &str, network: &str) -> Result<Self, RuntimeError> {
        let docker = if let Some(path) = base_url.strip_prefix("unix://") {
            Docker::connect_with_unix(path, 120, bollard::API_DEFAULT_VERSION)
        } else if base_url.starts_with("http://") || base_url.starts_with("tcp://") {
            Docker::connect_with_http(base_url, 120, bollard::API_DEFAULT_VERSION)
        } else {
            Docker::connect_with_local_defaults()
        }
        .map_err(|e| RuntimeError::Unavailable(format!("Failed to connect to Docker: {e}")))?;

        Ok(Self {
            docker,
            network: network.to_string(),
        })
    }

    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Unavailable(format!("Docker daemon not reachable: {e}")))?;
        Ok(())
    }

    fn ip_on_network(&self, inspect: &bollard::models::ContainerInspectResponse) -> Option<String> {
        inspect
            .network_settings
            .as_ref()?
            .networks
            .as_ref()?
            .get(&self.network)?
            .ip_address
            .clone()
            .filter(|ip| !ip.is_empty())
    }
}

fn map_engine_error(err: bollard::errors::Error) -> RuntimeError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => match status_code {
            404 => RuntimeError::NotFound(message),
            409 => RuntimeError::Conflict(message),
            _ => RuntimeError::Engine(message),
        },
        other => RuntimeError::Unavailable(other.to_string()),
    }
}

fn map_status(status: Option<bollard::models::ContainerStateStatusEnum>) -> EngineStatus {
    use bollard::models::ContainerStateStatusEnum as S;
    match status {
        Some(S::CREATED) => EngineStatus::Created,
        Some(S::RUNNING) => EngineStatus::Running,
        Some(S::PAUSED) => EngineStatus::Paused,
        Some(S::RESTARTING) => EngineStatus::Restarting,
        Some(S::EXITED) => EngineStatus::Exited,
        Some(S::DEAD) => EngineStatus::Dead,
        Some(S::REMOVING) => EngineStatus::Removing,
        _ => EngineStatus::Unknown,
    }
}

struct DockerExecReader {
    output: Pin<Box<dyn Stream<Item = Result<LogOutput, bollard::errors::Error>> + Send>>,
}

#[async_trait]
impl ExecReader for DockerExecReader {
    async fn read(&mut self) -> Result<Bytes, RuntimeError> {
        match self.output.next().await {
            Some(Ok(chunk)) => Ok(chunk.into_bytes()),
            Some(Err(e)) => Err(map_engine_error(e)),
            None => Ok(Bytes::new()),
        }
    }
}

struct DockerExecWriter {
    input: Pin<Box<dyn AsyncWrite + Send>>,
}

#[async_trait]
impl ExecWriter for DockerExecWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), RuntimeError> {
        self.input
            .write_all(data)
            .await
            .map_err(|e| RuntimeError::Engine(format!("exec write failed: {e}")))
    }

    async fn shutdown(&mut self) -> Result<(), RuntimeError> {
        self.input
            .shutdown()
            .await
            .map_err(|e| RuntimeError::Engine(format!("exec shutdown failed: {e}")))
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let host_config = HostConfig {
            binds: Some(
                spec.binds
                    .iter()
                    .map(|(host, container)| format!("{host}:{container}"))
                    .collect(),
            ),
            network_mode: Some(spec.network.clone()),
            memory: Some(spec.memory_bytes),
            cpu_period: Some(spec.cpu_period),
            cpu_quota: Some(spec.cpu_quota),
            pids_limit: Some(spec.pids_limit),
            runtime: spec.runtime.clone(),
            ..Default::default()
        };

        let env_vars: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        let labels: HashMap<String, String> = spec.labels.iter().cloned().collect();

        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        let container_config = ContainerCreateBody {
            image: Some(spec.image.clone()),
            hostname: Some(spec.hostname.clone()),
            env: Some(env_vars),
            labels: Some(labels),
            tty: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let res = self
            .docker
            .create_container(Some(options), container_config)
            .await
            .map_err(map_engine_error)?;

        info!(container = %spec.name, id = %res.id, "created container");
        Ok(res.id)
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(name, None::<StartContainerOptions>)
            .await
            .map_err(map_engine_error)
    }

    async fn stop(&self, name: &str, grace_seconds: i64) -> Result<(), RuntimeError> {
        self.docker
            .stop_container(
                name,
                Some(StopContainerOptions {
                    t: Some(grace_seconds as i32),
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_error)
    }

    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        let inspect = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(map_engine_error)?;

        let status = map_status(inspect.state.as_ref().and_then(|s| s.status));
        let ip = self.ip_on_network(&inspect);
        Ok(ContainerState { status, ip })
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                name,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_error)?;
        info!(container = %name, "removed container");
        Ok(())
    }

    async fn logs_tail(&self, name: &str, lines: usize) -> Result<String, RuntimeError> {
        let mut stream = self.docker.logs(
            name,
            Some(LogsOptions {
                stdout: true,
                stderr: true,
                tail: lines.to_string(),
                ..Default::default()
            }),
        );

        let mut out = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(log) => out.push_str(&String::from_utf8_lossy(&log.into_bytes())),
                Err(e) => return Err(map_engine_error(e)),
            }
        }
        Ok(out.trim().to_string())
    }

    async fn exec_unary(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        env: &[(String, String)],
    ) -> Result<ExecOutput, RuntimeError> {
        let env_vars: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let exec = self
            .docker
            .create_exec(
                name,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    user: Some(user.to_string()),
                    env: if env_vars.is_empty() {
                        None
                    } else {
                        Some(env_vars)
                    },
                    cmd: Some(argv.to_vec()),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_engine_error)?;

        let res = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_error)?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        if let StartExecResults::Attached { mut output, .. } = res {
            while let Some(msg) = output.next().await {
                match msg {
                    Ok(LogOutput::StdOut { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::StdErr { message }) => {
                        stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(LogOutput::Console { message }) => {
                        stdout.push_str(&String::from_utf8_lossy(&message));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(map_engine_error(e)),
                }
            }
        }

        let inspect = self
            .docker
            .inspect_exec(&exec.id)
            .await
            .map_err(map_engine_error)?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: inspect.exit_code.unwrap_or(-1),
        })
    }

    async fn exec_stream(
        &self,
        name: &str,
        argv: &[String],
        user: &str,
        env: &[(String, String)],
        tty: bool,
        stdin: bool,
    ) -> Result<ExecChannel, RuntimeError> {
        let env_vars: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();

        let exec = self
            .docker
            .create_exec(
                name,
                CreateExecOptions {
                    attach_stdin: Some(stdin),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(tty),
                    user: Some(user.to_string()),
                    env: if env_vars.is_empty() {
                        None
                    } else {
                        Some(env_vars)
                    },
                    cmd: Some(argv.to_vec()),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_engine_error)?;

        let res = self
            .docker
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(map_engine_error)?;

        match res {
            StartExecResults::Attached { output, input } => Ok(ExecChannel {
                exec_id: exec.id,
                reader: Box::new(DockerExecReader { output }),
                writer: Box::new(DockerExecWriter { input }),
            }),
            StartExecResults::Detached => Err(RuntimeError::Engine(
                "exec unexpectedly started detached".to_string(),
            )),
        }
    }

    async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError> {
        self.docker
            .resize_exec(
                exec_id,
                ResizeExecOptions {
                    height: rows,
                    width: cols,
                },
            )
            .await
            .map_err(map_engine_error)
    }
}
