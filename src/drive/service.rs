//! Drive service: structural operations that touch both the node store and
//! the filesystem.
//!
//! This module provides the ordering rules between the two stores:
//! - Create: directories on disk first, then metadata
//! - Move/rename: metadata statements, filesystem rename, then commit
//! - Delete: metadata commit first, then best-effort filesystem removal

use std::path::PathBuf;

use tracing::{error, info, warn};

use super::ingest::{Ingested, IngestionPipeline, Upload};
use super::mirror::{FileInfo, FilesystemMirror};
use crate::db::Database;
use crate::tree::{path, FileTree, Node, NodeRepository, PendingRelocation, TreeBuilder};
use crate::{DriveError, Result};

/// Result of a directory creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedDir {
    pub id: i64,
    pub path: String,
    /// False when the directory already existed.
    pub created: bool,
}

/// Result of a rename or move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocated {
    pub id: i64,
    pub old_path: String,
    pub new_path: String,
}

/// Result of a deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub path: String,
    pub nodes_removed: u64,
    /// Set when metadata is gone but the filesystem may still hold bytes.
    pub warning: Option<String>,
}

/// What a download resolves to.
#[derive(Debug)]
pub enum DownloadTarget {
    File { node: Node, content: Vec<u8> },
    Directory { node: Node, location: PathBuf },
}

/// Drive service combining the node repository and the filesystem mirror.
pub struct DriveService<'a> {
    db: &'a Database,
    mirror: &'a FilesystemMirror,
}

impl<'a> DriveService<'a> {
    /// Create a new DriveService.
    pub fn new(db: &'a Database, mirror: &'a FilesystemMirror) -> Self {
        Self { db, mirror }
    }

    fn repo(&self) -> NodeRepository<'_> {
        NodeRepository::new(self.db.pool())
    }

    /// Store an uploaded file.
    pub async fn upload(&self, upload: &Upload) -> Result<Ingested> {
        IngestionPipeline::new(self.db.pool(), self.mirror)
            .ingest(upload)
            .await
    }

    /// Nested listing of the whole drive.
    pub async fn tree(&self) -> Result<FileTree> {
        TreeBuilder::new(self.db.pool()).build_tree().await
    }

    /// Flat listing of every node.
    pub async fn list(&self) -> Result<Vec<Node>> {
        self.repo().list_all().await
    }

    /// Create a directory and any missing parents.
    ///
    /// An existing directory is returned unchanged; an existing file at the
    /// path or at any ancestor is a `Conflict`, raised before the disk is
    /// touched.
    pub async fn create_dir(&self, dir: &str) -> Result<CreatedDir> {
        path::validate_path(dir)?;
        let repo = self.repo();

        if let Some(existing) = repo.get_by_path(dir).await? {
            if !existing.is_dir {
                return Err(DriveError::Conflict(format!("'{dir}' exists as a file")));
            }
            self.mirror.create_dir_all(dir)?;
            return Ok(CreatedDir {
                id: existing.id,
                path: existing.path,
                created: false,
            });
        }

        let mut chain = path::ancestors(dir);
        for ancestor in &chain {
            if repo.get_by_path(ancestor).await?.is_some_and(|n| !n.is_dir) {
                return Err(DriveError::Conflict(format!(
                    "'{ancestor}' exists as a file"
                )));
            }
        }

        chain.push(dir);
        let first_new = chain.into_iter().find(|step| !self.mirror.exists(step));

        self.mirror.create_dir_all(dir)?;
        let (id, created) = match repo.ensure_directory(dir).await {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(top) = first_new {
                    match self.mirror.remove_tree(top) {
                        Ok(_) => warn!(path = %top, "removed directories after metadata failure"),
                        Err(cleanup) => error!(
                            path = %top,
                            error = %cleanup,
                            "could not remove directories after metadata failure"
                        ),
                    }
                }
                return Err(e);
            }
        };

        info!(id, path = %dir, "directory created");
        Ok(CreatedDir {
            id,
            path: dir.to_string(),
            created,
        })
    }

    /// Rename the last segment of `from` to `new_name`.
    pub async fn rename(&self, from: &str, new_name: &str) -> Result<Relocated> {
        let pending = self.repo().prepare_rename(from, new_name).await?;
        self.relocate(pending).await
    }

    /// Move `from` under `new_parent` (`""` for the root).
    pub async fn move_node(&self, from: &str, new_parent: &str) -> Result<Relocated> {
        let pending = self.repo().prepare_move(from, new_parent).await?;
        self.relocate(pending).await
    }

    /// Run the filesystem rename between the metadata statements and commit.
    async fn relocate(&self, pending: PendingRelocation) -> Result<Relocated> {
        let id = pending.node_id();
        let old_path = pending.old_path().to_string();

        if pending.is_noop() {
            let new_path = pending.commit().await?;
            return Ok(Relocated {
                id,
                old_path,
                new_path,
            });
        }

        let new_path = pending.new_path().to_string();
        if let Err(e) = self.mirror.rename(&old_path, &new_path) {
            warn!(
                from = %old_path,
                to = %new_path,
                error = %e,
                "filesystem rename failed, rolling back"
            );
            if let Err(rollback) = pending.rollback().await {
                error!(error = %rollback, "rollback after failed rename also failed");
            }
            return Err(e);
        }

        if let Err(e) = pending.commit().await {
            warn!(
                from = %old_path,
                to = %new_path,
                error = %e,
                "commit failed, reverting filesystem rename"
            );
            if let Err(revert) = self.mirror.rename(&new_path, &old_path) {
                error!(
                    from = %old_path,
                    to = %new_path,
                    error = %revert,
                    "could not revert filesystem rename; bytes now live at the new path"
                );
            }
            return Err(e);
        }

        info!(id, from = %old_path, to = %new_path, "node relocated");
        Ok(Relocated {
            id,
            old_path,
            new_path,
        })
    }

    /// Delete a single file or empty directory.
    pub async fn delete(&self, target: &str) -> Result<Deleted> {
        let deleted = self.repo().delete_leaf(target).await?;
        let warning = self.remove_after_commit(target, |m| m.remove_entry(target));
        Ok(Deleted {
            path: target.to_string(),
            nodes_removed: deleted.nodes_removed,
            warning,
        })
    }

    /// Delete a directory and everything below it.
    pub async fn delete_tree(&self, target: &str) -> Result<Deleted> {
        let deleted = self.repo().delete_subtree(target).await?;
        let warning = self.remove_after_commit(target, |m| m.remove_tree(target));
        Ok(Deleted {
            path: target.to_string(),
            nodes_removed: deleted.nodes_removed,
            warning,
        })
    }

    /// Metadata is already committed; failures here only produce a warning.
    fn remove_after_commit(
        &self,
        target: &str,
        remove: impl FnOnce(&FilesystemMirror) -> Result<bool>,
    ) -> Option<String> {
        match remove(self.mirror) {
            Ok(true) => None,
            Ok(false) => {
                warn!(path = %target, "nothing on disk to remove");
                None
            }
            Err(e) => {
                warn!(
                    path = %target,
                    error = %e,
                    "metadata deleted but filesystem removal failed"
                );
                Some(format!(
                    "metadata for '{target}' was deleted but its files could not be removed: {e}"
                ))
            }
        }
    }

    /// Resolve a download: bytes for a file, a location to archive for a
    /// directory.
    pub async fn download(&self, target: &str) -> Result<DownloadTarget> {
        path::validate_path(target)?;
        let node = self
            .repo()
            .get_by_path(target)
            .await?
            .ok_or_else(|| DriveError::NotFound(format!("'{target}'")))?;

        if node.is_dir {
            let location = self.mirror.resolve(&node.path)?;
            Ok(DownloadTarget::Directory { node, location })
        } else {
            let content = self.mirror.read(&node.path)?;
            Ok(DownloadTarget::File { node, content })
        }
    }

    /// Filesystem stat of an entry.
    pub fn info(&self, target: &str) -> Result<FileInfo> {
        self.mirror.info(target)
    }
}
