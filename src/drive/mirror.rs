//! Byte storage mirroring the node tree.
//!
//! Every logical path maps to `{root}/{path}` with one filesystem entry per
//! node, so the on-disk layout has the same shape as the node table:
//! ```text
//! {root}/
//! ├── photos/
//! │   └── 2024/
//! │       └── beach.jpg
//! └── notes.txt
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tree::path;
use crate::{DriveError, Result};

/// Filesystem stat of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mode: String,
    pub mod_time: String,
    pub is_directory: bool,
}

/// Filesystem side of every structural mutation.
#[derive(Debug, Clone)]
pub struct FilesystemMirror {
    root: PathBuf,
}

impl FilesystemMirror {
    /// Create a mirror rooted at `root`.
    ///
    /// The root directory will be created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        Ok(Self { root })
    }

    /// Get the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a logical path to its location under the root.
    pub fn resolve(&self, logical: &str) -> Result<PathBuf> {
        path::validate_path(logical)?;
        Ok(logical
            .split('/')
            .fold(self.root.clone(), |acc, segment| acc.join(segment)))
    }

    /// Whether an entry exists at `logical`.
    pub fn exists(&self, logical: &str) -> bool {
        self.resolve(logical).map(|p| p.exists()).unwrap_or(false)
    }

    /// Write `content` at `logical`, creating parent directories.
    ///
    /// Returns `true` if a file was already there and got overwritten.
    pub fn write(&self, logical: &str, content: &[u8]) -> Result<bool> {
        let target = self.resolve(logical)?;

        if target.is_dir() {
            return Err(DriveError::Conflict(format!("'{logical}' is a directory")));
        }
        let existed = target.is_file();

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| mirror_err("create parent of", logical, e))?;
        }
        fs::write(&target, content).map_err(|e| mirror_err("write", logical, e))?;

        Ok(existed)
    }

    /// Create `logical` and any missing parents as directories.
    pub fn create_dir_all(&self, logical: &str) -> Result<()> {
        let target = self.resolve(logical)?;
        fs::create_dir_all(&target).map_err(|e| mirror_err("create directory", logical, e))
    }

    /// Rename `from` to `to`. The destination's parent is created if missing.
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;

        if target.exists() {
            return Err(DriveError::Mirror(format!(
                "rename '{from}' -> '{to}': destination already exists"
            )));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| mirror_err("create parent of", to, e))?;
        }
        fs::rename(&source, &target).map_err(|e| {
            DriveError::Mirror(format!("rename '{from}' -> '{to}': {e}"))
        })
    }

    /// Remove a file or a whole directory tree.
    ///
    /// Returns `false` if nothing was there.
    pub fn remove_tree(&self, logical: &str) -> Result<bool> {
        let target = self.resolve(logical)?;

        let result = match fs::symlink_metadata(&target) {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&target),
            Ok(_) => fs::remove_file(&target),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(mirror_err("remove", logical, e)),
        }
    }

    /// Remove a single file or empty directory.
    ///
    /// Returns `false` if nothing was there.
    pub fn remove_entry(&self, logical: &str) -> Result<bool> {
        let target = self.resolve(logical)?;

        let result = if target.is_dir() {
            fs::remove_dir(&target)
        } else {
            fs::remove_file(&target)
        };

        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(mirror_err("remove", logical, e)),
        }
    }

    /// Read a file's content.
    pub fn read(&self, logical: &str) -> Result<Vec<u8>> {
        let target = self.resolve(logical)?;

        match fs::read(&target) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DriveError::NotFound(format!("file '{logical}'")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stat an entry.
    pub fn info(&self, logical: &str) -> Result<FileInfo> {
        let target = self.resolve(logical)?;

        let meta = match fs::metadata(&target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DriveError::NotFound(format!("'{logical}'")));
            }
            Err(e) => return Err(e.into()),
        };

        let mod_time = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339())
            .unwrap_or_default();

        Ok(FileInfo {
            name: path::base_name(logical).to_string(),
            size: meta.len(),
            mode: mode_string(&meta),
            mod_time,
            is_directory: meta.is_dir(),
        })
    }
}

fn mirror_err(action: &str, logical: &str, e: io::Error) -> DriveError {
    DriveError::Mirror(format!("{action} '{logical}': {e}"))
}

/// `ls -l` style permission string, e.g. `drwxr-xr-x`.
#[cfg(unix)]
fn mode_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(10);
    out.push(if meta.is_dir() { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
fn mode_string(meta: &fs::Metadata) -> String {
    let kind = if meta.is_dir() { 'd' } else { '-' };
    let write = if meta.permissions().readonly() { '-' } else { 'w' };
    format!("{kind}r{write}-r--r--")
}
