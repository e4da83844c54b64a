// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! Filesystem access inside a user's container.
//!
//! Every read and write goes through [`ContainerRuntime::exec_unary`] under
//! the unprivileged account. Read-side operations run short Python programs
//! that print a single JSON document; write-side primitives are plain
//! coreutils argv. Dynamic input always travels as argv values or a base64
//! payload; nothing user-controlled is ever spliced into program text.
//!
//! This module owns path translation (`basePath + vfsPath`) and path
//! safety; translation only prefixes, so a validated path cannot escape
//! the VFS root.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::domain::error::CoreError;
use crate::domain::node::NodeType;
use crate::domain::runtime::{ContainerRuntime, ExecOutput, RuntimeError};
use crate::domain::vfs_path;

pub const EXEC_USER: &str = "aisu";
pub const DEFAULT_BASE_PATH: &str = "/home/aisu";
pub const TRASH_PATH: &str = "/.Trash";
pub const MAX_READ_SIZE: i64 = 2 * 1024 * 1024;
pub const MAX_SEARCH_RESULTS: usize = 50;

/// The in-container programs. Inputs arrive in `sys.argv`; each program
/// prints one JSON document on stdout. Recognized error conditions are
/// reported as `{"error": <discriminant>}` with exit code 0; a non-zero
/// exit means something unexpected happened.
pub mod programs {
    pub const STAT: &str = r#"
import json, mimetypes, os, sys

path = sys.argv[1]
try:
    st = os.stat(path)
except FileNotFoundError:
    print(json.dumps({"error": "not_found"}))
    sys.exit(0)
except PermissionError:
    print(json.dumps({"error": "permission_denied"}))
    sys.exit(0)
is_dir = os.path.isdir(path)
name = os.path.basename(path) or "/"
mime, _ = mimetypes.guess_type(name)
print(json.dumps({
    "name": name,
    "path": path,
    "type": "directory" if is_dir else "file",
    "size": 0 if is_dir else st.st_size,
    "mime_type": mime,
    "mtime": st.st_mtime,
    "ctime": st.st_ctime,
}))
"#;

    pub const LIST: &str = r#"
import json, mimetypes, os, sys

path = sys.argv[1]
try:
    entries = sorted(os.scandir(path), key=lambda e: (not e.is_dir(), e.name.lower()))
except FileNotFoundError:
    print(json.dumps({"error": "not_found"}))
    sys.exit(0)
except NotADirectoryError:
    print(json.dumps({"error": "not_directory"}))
    sys.exit(0)
except PermissionError:
    print(json.dumps({"error": "permission_denied"}))
    sys.exit(0)

result = []
for entry in entries:
    try:
        st = entry.stat(follow_symlinks=False)
    except OSError:
        continue
    mime, _ = mimetypes.guess_type(entry.name)
    is_dir = entry.is_dir(follow_symlinks=False)
    result.append({
        "name": entry.name,
        "path": entry.path,
        "type": "directory" if is_dir else "file",
        "size": 0 if is_dir else st.st_size,
        "mime_type": mime,
        "mtime": st.st_mtime,
        "ctime": st.st_ctime,
    })
print(json.dumps(result))
"#;

    pub const TREE: &str = r#"
import json, mimetypes, os, sys

base = sys.argv[1]
max_depth = int(sys.argv[2])

def tree(path, depth):
    result = []
    if depth > max_depth:
        return result
    try:
        entries = sorted(os.scandir(path), key=lambda e: (not e.is_dir(), e.name.lower()))
    except (PermissionError, FileNotFoundError):
        return result
    for entry in entries:
        try:
            st = entry.stat(follow_symlinks=False)
        except OSError:
            continue
        mime, _ = mimetypes.guess_type(entry.name)
        is_dir = entry.is_dir(follow_symlinks=False)
        node = {
            "name": entry.name,
            "path": entry.path,
            "type": "directory" if is_dir else "file",
            "size": 0 if is_dir else st.st_size,
            "mime_type": mime,
            "mtime": st.st_mtime,
            "ctime": st.st_ctime,
        }
        if is_dir:
            node["children"] = tree(entry.path, depth + 1)
        result.append(node)
    return result

try:
    st = os.stat(base)
except OSError as e:
    print(json.dumps({"error": str(e)}))
    sys.exit(0)
print(json.dumps({
    "name": "/",
    "path": base,
    "type": "directory",
    "size": 0,
    "mime_type": None,
    "mtime": st.st_mtime,
    "ctime": st.st_ctime,
    "children": tree(base, 0),
}))
"#;

    pub const SEARCH: &str = r#"
import json, mimetypes, os, sys

query = sys.argv[1].lower()
scope = sys.argv[2]
max_results = int(sys.argv[3])
results = []

for root, dirs, files in os.walk(scope):
    for name in dirs + files:
        if query in name.lower():
            full_path = os.path.join(root, name)
            try:
                st = os.stat(full_path)
            except OSError:
                continue
            is_dir = os.path.isdir(full_path)
            mime, _ = mimetypes.guess_type(name)
            results.append({
                "name": name,
                "path": full_path,
                "type": "directory" if is_dir else "file",
                "size": 0 if is_dir else st.st_size,
                "mime_type": mime,
                "mtime": st.st_mtime,
                "ctime": st.st_ctime,
            })
            if len(results) >= max_results:
                break
    if len(results) >= max_results:
        break

print(json.dumps(results))
"#;

    pub const READ_FILE: &str = r#"
import json, os, sys

path = sys.argv[1]
max_size = int(sys.argv[2])

if not os.path.exists(path):
    print(json.dumps({"error": "not_found"}))
    sys.exit(0)
if os.path.isdir(path):
    print(json.dumps({"error": "is_directory"}))
    sys.exit(0)
size = os.path.getsize(path)
if size > max_size:
    print(json.dumps({"error": "too_large", "size": size}))
    sys.exit(0)
try:
    with open(path, "r", encoding="utf-8") as f:
        content = f.read()
except UnicodeDecodeError:
    print(json.dumps({"error": "binary_file"}))
    sys.exit(0)
print(json.dumps({"content": content, "size": size, "encoding": "utf-8"}))
"#;

    pub const WRITE_FILE: &str = r#"
import base64, json, os, sys

path = sys.argv[1]
encoded = sys.argv[2]
try:
    content = base64.b64decode(encoded).decode("utf-8")
    parent = os.path.dirname(path)
    if parent and not os.path.exists(parent):
        os.makedirs(parent, exist_ok=True)
    with open(path, "w", encoding="utf-8") as f:
        f.write(content)
    print(json.dumps({"ok": True}))
except Exception as e:
    print(json.dumps({"error": str(e)}))
    sys.exit(1)
"#;
}

/// One filesystem entry as reported from inside the container. Paths are
/// translated back to VFS form before an entry leaves this module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub size: i64,
    pub mime_type: Option<String>,
    pub mtime: f64,
    pub ctime: f64,
    #[serde(default)]
    pub children: Vec<FsEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileContent {
    pub content: String,
    pub size: i64,
    pub encoding: String,
}

pub struct ContainerFs {
    runtime: Arc<dyn ContainerRuntime>,
    container_name: String,
    base_path: String,
}

impl ContainerFs {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, container_name: impl Into<String>) -> Self {
        Self {
            runtime,
            container_name: container_name.into(),
            base_path: DEFAULT_BASE_PATH.to_string(),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Validate, then translate a VFS path to its container-side form.
    fn to_container(&self, path: &str) -> Result<String, CoreError> {
        vfs_path::validate(path)?;
        if vfs_path::is_root(path) {
            Ok(self.base_path.clone())
        } else {
            Ok(format!("{}{}", self.base_path, path))
        }
    }

    fn to_vfs(&self, container_path: &str) -> String {
        if container_path == self.base_path
            || container_path == format!("{}/", self.base_path)
        {
            return "/".to_string();
        }
        match container_path.strip_prefix(&format!("{}/", self.base_path)) {
            Some(rest) => format!("/{rest}"),
            None => container_path.to_string(),
        }
    }

    fn entry_to_vfs(&self, mut entry: FsEntry) -> FsEntry {
        entry.path = self.to_vfs(&entry.path);
        entry.children = entry
            .children
            .into_iter()
            .map(|child| self.entry_to_vfs(child))
            .collect();
        entry
    }

    async fn exec(&self, argv: Vec<String>) -> Result<ExecOutput, CoreError> {
        self.runtime
            .exec_unary(&self.container_name, &argv, EXEC_USER, &[])
            .await
            .map_err(|e| match e {
                RuntimeError::NotFound(_) => {
                    CoreError::Unavailable("Container is not available".to_string())
                }
                other => other.into(),
            })
    }

    /// Run one of the embedded programs and parse its JSON output. A
    /// non-zero exit means the program itself blew up, which is always a
    /// 500, never a client error.
    async fn exec_program(
        &self,
        program: &str,
        args: Vec<String>,
    ) -> Result<serde_json::Value, CoreError> {
        let mut argv = vec!["python3".to_string(), "-c".to_string(), program.to_string()];
        argv.extend(args);
        let out = self.exec(argv).await?;

        if out.exit_code != 0 {
            error!(
                container = %self.container_name,
                exit = out.exit_code,
                stderr = %truncate(&out.stderr, 500),
                "in-container program failed"
            );
            return Err(CoreError::Internal(format!(
                "Filesystem operation failed: {}",
                truncate(&out.stderr, 200)
            )));
        }

        serde_json::from_str(out.stdout.trim()).map_err(|e| {
            error!(
                container = %self.container_name,
                stdout = %truncate(&out.stdout, 500),
                "unparseable program output: {e}"
            );
            CoreError::Internal("Failed to parse filesystem response".to_string())
        })
    }

    // ── Read operations ──

    pub async fn stat(&self, path: &str) -> Result<Option<FsEntry>, CoreError> {
        let container_path = self.to_container(path)?;
        let value = self
            .exec_program(programs::STAT, vec![container_path])
            .await?;

        if value.get("error").is_some() {
            return Ok(None);
        }
        let entry: FsEntry = serde_json::from_value(value)
            .map_err(|_| CoreError::Internal("Failed to parse stat response".to_string()))?;
        Ok(Some(self.entry_to_vfs(entry)))
    }

    pub async fn exists(&self, path: &str) -> Result<bool, CoreError> {
        let container_path = self.to_container(path)?;
        let out = self
            .exec(vec!["test".into(), "-e".into(), container_path])
            .await?;
        Ok(out.exit_code == 0)
    }

    pub async fn list(&self, path: &str) -> Result<Vec<FsEntry>, CoreError> {
        let container_path = self.to_container(path)?;
        let value = self
            .exec_program(programs::LIST, vec![container_path])
            .await?;

        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(match err {
                "not_found" => CoreError::NotFound(format!("Directory not found: {path}")),
                "permission_denied" => CoreError::Forbidden(format!("Permission denied: {path}")),
                "not_directory" => CoreError::Validation(format!("Not a directory: {path}")),
                other => CoreError::Internal(format!("Filesystem error: {other}")),
            });
        }

        let entries: Vec<FsEntry> = serde_json::from_value(value)
            .map_err(|_| CoreError::Internal("Failed to parse directory listing".to_string()))?;
        Ok(entries.into_iter().map(|e| self.entry_to_vfs(e)).collect())
    }

    pub async fn tree(&self, max_depth: u32) -> Result<FsEntry, CoreError> {
        let value = self
            .exec_program(
                programs::TREE,
                vec![self.base_path.clone(), max_depth.to_string()],
            )
            .await?;

        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(CoreError::Internal(format!("Filesystem error: {err}")));
        }
        let entry: FsEntry = serde_json::from_value(value)
            .map_err(|_| CoreError::Internal("Failed to parse filesystem tree".to_string()))?;
        Ok(self.entry_to_vfs(entry))
    }

    pub async fn search(&self, query: &str, scope: &str) -> Result<Vec<FsEntry>, CoreError> {
        let scope_path = self.to_container(scope)?;
        let value = self
            .exec_program(
                programs::SEARCH,
                vec![
                    query.to_string(),
                    scope_path,
                    MAX_SEARCH_RESULTS.to_string(),
                ],
            )
            .await?;

        let entries: Vec<FsEntry> = serde_json::from_value(value)
            .map_err(|_| CoreError::Internal("Failed to parse search results".to_string()))?;
        Ok(entries.into_iter().map(|e| self.entry_to_vfs(e)).collect())
    }

    pub async fn read_file(&self, path: &str, max_size: i64) -> Result<FileContent, CoreError> {
        let container_path = self.to_container(path)?;
        let value = self
            .exec_program(
                programs::READ_FILE,
                vec![container_path, max_size.to_string()],
            )
            .await?;

        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(match err {
                "not_found" => CoreError::NotFound(format!("File not found: {path}")),
                "is_directory" => CoreError::Validation(format!("Path is a directory: {path}")),
                "too_large" => {
                    let size = value.get("size").and_then(|s| s.as_i64()).unwrap_or(0);
                    CoreError::PayloadTooLarge(format!(
                        "File too large: {size} bytes (max {max_size})"
                    ))
                }
                "binary_file" => CoreError::UnsupportedMedia(format!(
                    "Binary file cannot be opened as text: {path}"
                )),
                other => CoreError::Internal(format!("Filesystem error: {other}")),
            });
        }

        serde_json::from_value(value)
            .map_err(|_| CoreError::Internal("Failed to parse file content".to_string()))
    }

    // ── Write operations ──

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), CoreError> {
        use base64::Engine;
        let container_path = self.to_container(path)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(content.as_bytes());
        let value = self
            .exec_program(programs::WRITE_FILE, vec![container_path, encoded])
            .await?;

        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(CoreError::Internal(format!("Write failed: {err}")));
        }
        Ok(())
    }

    pub async fn create_file(&self, path: &str) -> Result<(), CoreError> {
        let container_path = self.to_container(path)?;
        let out = self.exec(vec!["touch".into(), container_path]).await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!("Failed to create file: {path}")));
        }
        Ok(())
    }

    pub async fn create_dir(&self, path: &str) -> Result<(), CoreError> {
        let container_path = self.to_container(path)?;
        let out = self
            .exec(vec!["mkdir".into(), "-p".into(), container_path])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to create directory: {path}"
            )));
        }
        Ok(())
    }

    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<(), CoreError> {
        let old_container = self.to_container(old_path)?;
        let new_container = self.to_container(new_path)?;
        let out = self
            .exec(vec!["mv".into(), old_container, new_container])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to rename: {old_path} -> {new_path}"
            )));
        }
        Ok(())
    }

    /// Move `source` *under* `dest_parent`, keeping its basename. Returns
    /// the new VFS path.
    pub async fn move_into(&self, source: &str, dest_parent: &str) -> Result<String, CoreError> {
        let source_container = self.to_container(source)?;
        let dest_container = self.to_container(dest_parent)?;
        let out = self
            .exec(vec![
                "mv".into(),
                source_container,
                format!("{dest_container}/"),
            ])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to move: {source} -> {dest_parent}"
            )));
        }
        Ok(vfs_path::join(dest_parent, &vfs_path::basename(source)))
    }

    /// Recursive copy of `source` to `dest_parent/target_name`. The target
    /// name is explicit so collisions can be resolved before any content
    /// is touched, leaving the source untouched.
    pub async fn copy_to(
        &self,
        source: &str,
        dest_parent: &str,
        target_name: &str,
    ) -> Result<String, CoreError> {
        let target = vfs_path::join(dest_parent, target_name);
        let source_container = self.to_container(source)?;
        let target_container = self.to_container(&target)?;
        let out = self
            .exec(vec![
                "cp".into(),
                "-r".into(),
                source_container,
                target_container,
            ])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to copy: {source} -> {dest_parent}"
            )));
        }
        Ok(target)
    }

    pub async fn delete(&self, path: &str) -> Result<(), CoreError> {
        if vfs_path::is_root(path) {
            return Err(CoreError::Validation("Cannot delete root".to_string()));
        }
        let container_path = self.to_container(path)?;
        let out = self
            .exec(vec!["rm".into(), "-rf".into(), container_path])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!("Failed to delete: {path}")));
        }
        Ok(())
    }

    /// Move a node into `/.Trash`, suffixing `name 2`, `name 3`, … on
    /// collision. Returns the path inside the trash.
    pub async fn move_to_trash(&self, path: &str) -> Result<String, CoreError> {
        if vfs_path::is_root(path) {
            return Err(CoreError::Validation("Cannot trash root".to_string()));
        }
        self.create_dir(TRASH_PATH).await?;

        let name = vfs_path::basename(path);
        let unique = self.generate_unique_name(TRASH_PATH, &name).await?;
        let trash_path = vfs_path::join(TRASH_PATH, &unique);

        let source_container = self.to_container(path)?;
        let trash_container = self.to_container(&trash_path)?;
        let out = self
            .exec(vec!["mv".into(), source_container, trash_container])
            .await?;
        if out.exit_code != 0 {
            return Err(CoreError::Internal(format!(
                "Failed to move to trash: {path}"
            )));
        }
        Ok(trash_path)
    }

    /// Remove every child of `/.Trash`; returns how many there were.
    pub async fn empty_trash(&self) -> Result<u64, CoreError> {
        self.create_dir(TRASH_PATH).await?;
        let children = self.list(TRASH_PATH).await?;
        for child in &children {
            self.delete(&child.path).await?;
        }
        Ok(children.len() as u64)
    }

    /// First free name in `parent`: the base itself, else `"base 2"`,
    /// `"base 3"`, …
    pub async fn generate_unique_name(
        &self,
        parent: &str,
        base_name: &str,
    ) -> Result<String, CoreError> {
        if !self.exists(&vfs_path::join(parent, base_name)).await? {
            return Ok(base_name.to_string());
        }
        let mut counter = 2u32;
        loop {
            let candidate = format!("{base_name} {counter}");
            if !self.exists(&vfs_path::join(parent, &candidate)).await? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
