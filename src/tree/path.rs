//! Logical path rules for the node tree.
//!
//! A logical path is relative to the storage root, uses `/` as the only
//! separator and has no empty, `.` or `..` segments. The root itself is the
//! empty string and never names a node.

use crate::{DriveError, Result};

/// Validate a single path segment (a file or directory name).
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(DriveError::InvalidPath("name cannot be empty".to_string()));
    }
    if name == "." || name == ".." {
        return Err(DriveError::InvalidPath(format!(
            "'{name}' is not allowed as a name"
        )));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(DriveError::InvalidPath(format!(
            "name '{name}' must not contain path separators"
        )));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(DriveError::InvalidPath(
            "name must not contain control characters".to_string(),
        ));
    }
    Ok(())
}

/// Validate a node path.
pub fn validate_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(DriveError::InvalidPath("path cannot be empty".to_string()));
    }
    if path.starts_with('/') || path.starts_with('\\') {
        return Err(DriveError::InvalidPath(format!(
            "path '{path}' must be relative to the storage root"
        )));
    }
    if path.ends_with('/') {
        return Err(DriveError::InvalidPath(format!(
            "path '{path}' must not end with '/'"
        )));
    }
    if let Some(first) = path.split('/').next() {
        // Drive prefixes such as "C:" escape the root on Windows hosts.
        if first.len() == 2 && first.ends_with(':') {
            return Err(DriveError::InvalidPath(format!(
                "path '{path}' must be relative to the storage root"
            )));
        }
    }
    for segment in path.split('/') {
        validate_name(segment)
            .map_err(|_| DriveError::InvalidPath(format!("invalid segment in path '{path}'")))?;
    }
    Ok(())
}

/// Normalize an optional directory argument.
///
/// Empty input and `.` mean the root and yield `""`.
/// A single trailing `/` is tolerated. Anything else must be a valid path.
pub fn normalize_dir(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Ok(String::new());
    }
    let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
    validate_path(trimmed)?;
    Ok(trimmed.to_string())
}

/// Join a parent path (possibly the root) and a name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Parent path of `path`, `""` for top-level entries.
pub fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Last segment of `path`.
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Whether `path` equals `ancestor` or lies below it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return true;
    }
    path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// Every proper ancestor of `path`, outermost first.
pub fn ancestors(path: &str) -> Vec<&str> {
    path.match_indices('/').map(|(idx, _)| &path[..idx]).collect()
}
