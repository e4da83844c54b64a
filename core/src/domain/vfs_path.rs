// Copyright (c) 2026 Aisu OS
// SPDX-License-Identifier: AGPL-3.0
//! VFS path rules and helpers.
//!
//! A VFS path is a `/`-rooted, forward-slash-separated string; `/` denotes
//! the user's home directory inside the container. Validation rejects any
//! whole `..` segment; the substring `..` inside a component (e.g.
//! `notes..bak`) is fine. Paths are capped at 4096 bytes total, 255 bytes
//! per segment.

use crate::domain::error::CoreError;

pub const MAX_PATH_LEN: usize = 4096;
pub const MAX_SEGMENT_LEN: usize = 255;

/// Validate a VFS path before it is translated to a container path.
/// Translation only ever prefixes, so a path that passes here cannot
/// escape the VFS root.
pub fn validate(path: &str) -> Result<(), CoreError> {
    if !path.starts_with('/') {
        return Err(CoreError::Validation(format!(
            "Path must start with '/': {path}"
        )));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(CoreError::Validation(format!(
            "Path too long ({} bytes, max {MAX_PATH_LEN})",
            path.len()
        )));
    }
    for segment in path.split('/') {
        if segment == ".." {
            tracing::warn!(path, "path traversal attempt rejected");
            return Err(CoreError::Validation(
                "Path must not contain a '..' segment".to_string(),
            ));
        }
        if segment.len() > MAX_SEGMENT_LEN {
            return Err(CoreError::Validation(format!(
                "Path segment too long ({} bytes, max {MAX_SEGMENT_LEN})",
                segment.len()
            )));
        }
    }
    Ok(())
}

/// Validate a single file or directory name (one segment).
pub fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation("Name must not be empty".to_string()));
    }
    if name.len() > MAX_SEGMENT_LEN {
        return Err(CoreError::Validation(format!(
            "Name too long ({} bytes, max {MAX_SEGMENT_LEN})",
            name.len()
        )));
    }
    if name.contains('/') || name == ".." || name == "." {
        return Err(CoreError::Validation(format!("Invalid name: {name}")));
    }
    Ok(())
}

pub fn is_root(path: &str) -> bool {
    path == "/"
}

/// `join("/", "a") == "/a"`, `join("/Documents", "a") == "/Documents/a"`.
pub fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent path; the parent of a first-level entry (and of `/`) is `/`.
pub fn parent(path: &str) -> String {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((head, _)) => head.to_string(),
    }
}

/// Final path component; `/` maps to `/`.
pub fn basename(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// True when `candidate` equals `ancestor` or lives below it.
pub fn is_self_or_descendant(candidate: &str, ancestor: &str) -> bool {
    candidate == ancestor || candidate.starts_with(&format!("{ancestor}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_root_and_nested_paths() {
        assert!(validate("/").is_ok());
        assert!(validate("/Documents").is_ok());
        assert!(validate("/Documents/notes/a.txt").is_ok());
    }

    #[test]
    fn rejects_whole_parent_segments() {
        assert!(validate("/..").is_err());
        assert!(validate("/Documents/../etc").is_err());
        assert!(validate("/../../etc/passwd").is_err());
    }

    #[test]
    fn allows_double_dot_inside_a_component() {
        assert!(validate("/Documents/notes..bak").is_ok());
        assert!(validate("/a..b/c").is_ok());
    }

    #[test]
    fn rejects_relative_and_oversized_paths() {
        assert!(validate("Documents").is_err());
        let long = format!("/{}", "a".repeat(MAX_PATH_LEN));
        assert!(validate(&long).is_err());
        let long_segment = format!("/{}", "a".repeat(MAX_SEGMENT_LEN + 1));
        assert!(validate(&long_segment).is_err());
    }

    #[test]
    fn join_parent_basename_roundtrip() {
        assert_eq!(join("/", "a.txt"), "/a.txt");
        assert_eq!(join("/Documents", "a.txt"), "/Documents/a.txt");
        assert_eq!(parent("/Documents/a.txt"), "/Documents");
        assert_eq!(parent("/a.txt"), "/");
        assert_eq!(parent("/"), "/");
        assert_eq!(basename("/Documents/a.txt"), "a.txt");
        assert_eq!(basename("/"), "/");
    }

    #[test]
    fn self_or_descendant_checks() {
        assert!(is_self_or_descendant("/a", "/a"));
        assert!(is_self_or_descendant("/a/b/c", "/a"));
        assert!(!is_self_or_descendant("/ab", "/a"));
        assert!(!is_self_or_descendant("/b", "/a"));
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("notes.txt").is_ok());
        assert!(validate_name("a..b").is_ok());
        assert!(validate_name("..").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("").is_err());
    }
}
