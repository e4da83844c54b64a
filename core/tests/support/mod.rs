// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Test doubles for the container runtime seam.
//!
//! [`LocalRuntime`] backs a container's filesystem with a temp directory on
//! the host: it interprets the coreutils argv and the embedded read
//! programs that [`aisu_core::application::container_fs`] issues, so the
//! whole filesystem service stack runs without an engine. This is exactly
//! the substitution the `ContainerRuntime` trait exists for.
//!
//! [`RecordingRuntime`] records every call and serves scripted inspect
//! results, for lifecycle and terminal tests.

// Each integration-test binary compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use aisu_core::application::container_fs::{programs, DEFAULT_BASE_PATH};
use aisu_core::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, EngineStatus, ExecChannel, ExecOutput,
    ExecReader, ExecWriter, RuntimeError,
};

// ── LocalRuntime ──

pub struct LocalRuntime {
    root: PathBuf,
    pub exec_count: AtomicUsize,
}

impl LocalRuntime {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            exec_count: AtomicUsize::new(0),
        }
    }

    pub fn execs(&self) -> usize {
        self.exec_count.load(Ordering::SeqCst)
    }

    fn host_path(&self, container_path: &str) -> PathBuf {
        let rest = container_path
            .strip_prefix(DEFAULT_BASE_PATH)
            .unwrap_or(container_path)
            .trim_start_matches('/');
        if rest.is_empty() {
            self.root.clone()
        } else {
            self.root.join(rest)
        }
    }

    fn entry_json(&self, container_path: &str, name: &str) -> Option<serde_json::Value> {
        let host = self.host_path(container_path);
        let metadata = std::fs::symlink_metadata(&host).ok()?;
        let is_dir = metadata.is_dir();
        let mtime = system_time_secs(metadata.modified().ok());
        let created = system_time_secs(metadata.created().ok());
        Some(serde_json::json!({
            "name": name,
            "path": container_path,
            "type": if is_dir { "directory" } else { "file" },
            "size": if is_dir { 0 } else { metadata.len() as i64 },
            "mime_type": guess_mime(name),
            "mtime": mtime,
            "ctime": if created > 0.0 { created } else { mtime },
        }))
    }

    fn list_json(&self, container_path: &str) -> serde_json::Value {
        let host = self.host_path(container_path);
        if !host.exists() {
            return serde_json::json!({ "error": "not_found" });
        }
        if !host.is_dir() {
            return serde_json::json!({ "error": "not_directory" });
        }
        let mut names: Vec<(bool, String)> = match std::fs::read_dir(&host) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| {
                    (
                        entry.path().is_dir(),
                        entry.file_name().to_string_lossy().to_string(),
                    )
                })
                .collect(),
            Err(_) => return serde_json::json!({ "error": "permission_denied" }),
        };
        names.sort_by_key(|(is_dir, name)| (!is_dir, name.to_lowercase()));

        let children: Vec<serde_json::Value> = names
            .into_iter()
            .filter_map(|(_, name)| {
                self.entry_json(&format!("{}/{name}", container_path.trim_end_matches('/')), &name)
            })
            .collect();
        serde_json::Value::Array(children)
    }

    fn tree_json(&self, container_path: &str, depth: u32, max_depth: u32) -> Vec<serde_json::Value> {
        if depth > max_depth {
            return Vec::new();
        }
        let serde_json::Value::Array(children) = self.list_json(container_path) else {
            return Vec::new();
        };
        children
            .into_iter()
            .map(|mut child| {
                if child["type"] == "directory" {
                    let child_path = child["path"].as_str().unwrap_or_default().to_string();
                    child["children"] = serde_json::Value::Array(self.tree_json(
                        &child_path,
                        depth + 1,
                        max_depth,
                    ));
                }
                child
            })
            .collect()
    }

    fn search_json(
        &self,
        query: &str,
        container_scope: &str,
        max_results: usize,
        results: &mut Vec<serde_json::Value>,
    ) {
        if results.len() >= max_results {
            return;
        }
        let serde_json::Value::Array(children) = self.list_json(container_scope) else {
            return;
        };
        for child in &children {
            if results.len() >= max_results {
                return;
            }
            let name = child["name"].as_str().unwrap_or_default();
            if name.to_lowercase().contains(&query.to_lowercase()) {
                results.push(child.clone());
            }
        }
        for child in children {
            if child["type"] == "directory" {
                let path = child["path"].as_str().unwrap_or_default().to_string();
                self.search_json(query, &path, max_results, results);
            }
        }
    }

    fn run_program(&self, program: &str, args: &[String]) -> ExecOutput {
        let value = if program == programs::STAT {
            let container_path = &args[0];
            let name = container_path
                .rsplit('/')
                .next()
                .filter(|n| !n.is_empty())
                .unwrap_or("/");
            self.entry_json(container_path, name)
                .unwrap_or_else(|| serde_json::json!({ "error": "not_found" }))
        } else if program == programs::LIST {
            self.list_json(&args[0])
        } else if program == programs::TREE {
            let base = &args[0];
            let max_depth: u32 = args[1].parse().unwrap_or(10);
            match self.entry_json(base, "/") {
                Some(mut root) => {
                    root["children"] =
                        serde_json::Value::Array(self.tree_json(base, 0, max_depth));
                    root
                }
                None => serde_json::json!({ "error": "no such file or directory" }),
            }
        } else if program == programs::SEARCH {
            let max_results: usize = args[2].parse().unwrap_or(50);
            let mut results = Vec::new();
            self.search_json(&args[0], &args[1], max_results, &mut results);
            serde_json::Value::Array(results)
        } else if program == programs::READ_FILE {
            let host = self.host_path(&args[0]);
            let max_size: u64 = args[1].parse().unwrap_or(0);
            if !host.exists() {
                serde_json::json!({ "error": "not_found" })
            } else if host.is_dir() {
                serde_json::json!({ "error": "is_directory" })
            } else {
                let size = host.metadata().map(|m| m.len()).unwrap_or(0);
                if size > max_size {
                    serde_json::json!({ "error": "too_large", "size": size })
                } else {
                    match std::fs::read(&host) {
                        Ok(bytes) => match String::from_utf8(bytes) {
                            Ok(content) => serde_json::json!({
                                "content": content,
                                "size": size,
                                "encoding": "utf-8",
                            }),
                            Err(_) => serde_json::json!({ "error": "binary_file" }),
                        },
                        Err(e) => serde_json::json!({ "error": e.to_string() }),
                    }
                }
            }
        } else if program == programs::WRITE_FILE {
            use base64::Engine;
            let host = self.host_path(&args[0]);
            match base64::engine::general_purpose::STANDARD.decode(&args[1]) {
                Ok(bytes) => {
                    if let Some(parent) = host.parent() {
                        let _ = std::fs::create_dir_all(parent);
                    }
                    match std::fs::write(&host, bytes) {
                        Ok(()) => serde_json::json!({ "ok": true }),
                        Err(e) => return failure(&e.to_string()),
                    }
                }
                Err(e) => return failure(&e.to_string()),
            }
        } else {
            return failure("unknown program");
        };

        ExecOutput {
            stdout: value.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    fn run_argv(&self, argv: &[String]) -> ExecOutput {
        let cmd: Vec<&str> = argv.iter().map(String::as_str).collect();
        match cmd.as_slice() {
            ["test", "-e", path] => exit_only(if self.host_path(path).exists() { 0 } else { 1 }),
            ["touch", path] => {
                let host = self.host_path(path);
                match std::fs::OpenOptions::new().create(true).append(true).open(&host) {
                    Ok(_) => exit_only(0),
                    Err(e) => failure(&e.to_string()),
                }
            }
            ["mkdir", "-p", rest @ ..] => {
                for path in rest {
                    if std::fs::create_dir_all(self.host_path(path)).is_err() {
                        return failure("mkdir failed");
                    }
                }
                exit_only(0)
            }
            ["mv", source, dest] => {
                let source_host = self.host_path(source);
                let dest_host = if dest.ends_with('/') {
                    let name = source.rsplit('/').next().unwrap_or_default();
                    self.host_path(dest).join(name)
                } else {
                    self.host_path(dest)
                };
                match std::fs::rename(&source_host, &dest_host) {
                    Ok(()) => exit_only(0),
                    Err(e) => failure(&e.to_string()),
                }
            }
            ["cp", "-r", source, dest] => {
                match copy_recursive(&self.host_path(source), &self.host_path(dest)) {
                    Ok(()) => exit_only(0),
                    Err(e) => failure(&e.to_string()),
                }
            }
            ["rm", "-rf", path] => {
                let host = self.host_path(path);
                let result = if host.is_dir() {
                    std::fs::remove_dir_all(&host)
                } else if host.exists() {
                    std::fs::remove_file(&host)
                } else {
                    Ok(())
                };
                match result {
                    Ok(()) => exit_only(0),
                    Err(e) => failure(&e.to_string()),
                }
            }
            ["python3", "-c", program, args @ ..] => {
                let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
                self.run_program(program, &args)
            }
            ["bash", "-c", _] | ["screen", ..] => exit_only(0),
            _ => failure("unhandled argv"),
        }
    }
}

#[async_trait]
impl ContainerRuntime for LocalRuntime {
    async fn create(&self, _spec: &ContainerSpec) -> Result<String, RuntimeError> {
        Ok("local".to_string())
    }

    async fn start(&self, _name: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn stop(&self, _name: &str, _grace_seconds: i64) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn inspect(&self, _name: &str) -> Result<ContainerState, RuntimeError> {
        Ok(ContainerState {
            status: EngineStatus::Running,
            ip: None,
        })
    }

    async fn remove(&self, _name: &str) -> Result<(), RuntimeError> {
        Ok(())
    }

    async fn logs_tail(&self, _name: &str, _lines: usize) -> Result<String, RuntimeError> {
        Ok(String::new())
    }

    async fn exec_unary(
        &self,
        _name: &str,
        argv: &[String],
        _user: &str,
        _env: &[(String, String)],
    ) -> Result<ExecOutput, RuntimeError> {
        self.exec_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.run_argv(argv))
    }

    async fn exec_stream(
        &self,
        _name: &str,
        _argv: &[String],
        _user: &str,
        _env: &[(String, String)],
        _tty: bool,
        _stdin: bool,
    ) -> Result<ExecChannel, RuntimeError> {
        Err(RuntimeError::Engine("no streams in LocalRuntime".to_string()))
    }

    async fn resize_exec(&self, _exec_id: &str, _rows: u16, _cols: u16) -> Result<(), RuntimeError> {
        Ok(())
    }
}

fn exit_only(code: i64) -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: String::new(),
        exit_code: code,
    }
}

fn failure(message: &str) -> ExecOutput {
    ExecOutput {
        stdout: String::new(),
        stderr: message.to_string(),
        exit_code: 1,
    }
}

fn system_time_secs(time: Option<std::time::SystemTime>) -> f64 {
    time.and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn guess_mime(name: &str) -> Option<&'static str> {
    match name.rsplit('.').next() {
        Some("txt") => Some("text/plain"),
        Some("png") => Some("image/png"),
        Some("json") => Some("application/json"),
        _ => None,
    }
}

fn copy_recursive(source: &Path, dest: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        std::fs::copy(source, dest)?;
    }
    Ok(())
}

// ── RecordingRuntime ──

#[derive(Default)]
pub struct RecordingRuntime {
    pub calls: Mutex<Vec<String>>,
    pub inspect_results: Mutex<VecDeque<Result<ContainerState, RuntimeError>>>,
    pub fail_create: bool,
    pub conflict_create: bool,
    pub written: Arc<Mutex<Vec<u8>>>,
}

impl RecordingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn conflicting_create() -> Self {
        Self {
            conflict_create: true,
            ..Self::default()
        }
    }

    pub fn queue_inspect(&self, result: Result<ContainerState, RuntimeError>) {
        self.inspect_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called(&self, needle: &str) -> bool {
        self.calls().iter().any(|call| call.contains(needle))
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn running_state() -> ContainerState {
    ContainerState {
        status: EngineStatus::Running,
        ip: Some("10.66.0.2".to_string()),
    }
}

pub fn exited_state() -> ContainerState {
    ContainerState {
        status: EngineStatus::Exited,
        ip: None,
    }
}

struct EmptyReader;

#[async_trait]
impl ExecReader for EmptyReader {
    async fn read(&mut self) -> Result<Bytes, RuntimeError> {
        Ok(Bytes::new())
    }
}

struct SinkWriter {
    written: Arc<Mutex<Vec<u8>>>,
}

#[async_trait]
impl ExecWriter for SinkWriter {
    async fn write(&mut self, data: &[u8]) -> Result<(), RuntimeError> {
        self.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), RuntimeError> {
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for RecordingRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.record(format!("create {}", spec.name));
        if self.fail_create {
            return Err(RuntimeError::Engine("create failed".to_string()));
        }
        if self.conflict_create {
            return Err(RuntimeError::Conflict(format!(
                "name {} already in use",
                spec.name
            )));
        }
        Ok(format!("cid-{}", spec.name))
    }

    async fn start(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("start {name}"));
        Ok(())
    }

    async fn stop(&self, name: &str, grace_seconds: i64) -> Result<(), RuntimeError> {
        self.record(format!("stop {name} grace={grace_seconds}"));
        Ok(())
    }

    async fn inspect(&self, name: &str) -> Result<ContainerState, RuntimeError> {
        self.record(format!("inspect {name}"));
        match self.inspect_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(running_state()),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(format!("remove {name}"));
        Ok(())
    }

    async fn logs_tail(&self, name: &str, _lines: usize) -> Result<String, RuntimeError> {
        self.record(format!("logs {name}"));
        Ok("panic: out of memory".to_string())
    }

    async fn exec_unary(
        &self,
        name: &str,
        argv: &[String],
        _user: &str,
        _env: &[(String, String)],
    ) -> Result<ExecOutput, RuntimeError> {
        self.record(format!("exec {name}: {}", argv.join(" ")));
        Ok(exit_only(0))
    }

    async fn exec_stream(
        &self,
        name: &str,
        argv: &[String],
        _user: &str,
        _env: &[(String, String)],
        _tty: bool,
        _stdin: bool,
    ) -> Result<ExecChannel, RuntimeError> {
        self.record(format!("exec_stream {name}: {}", argv.join(" ")));
        Ok(ExecChannel {
            exec_id: format!("exec-{name}"),
            reader: Box::new(EmptyReader),
            writer: Box::new(SinkWriter {
                written: Arc::clone(&self.written),
            }),
        })
    }

    async fn resize_exec(&self, exec_id: &str, rows: u16, cols: u16) -> Result<(), RuntimeError> {
        self.record(format!("resize {exec_id} {rows}x{cols}"));
        Ok(())
    }
}
