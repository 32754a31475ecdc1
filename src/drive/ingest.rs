//! Upload ingestion: validate, write bytes, upsert metadata.

use tracing::{debug, error, info, warn};

use super::mirror::FilesystemMirror;
use crate::db::DbPool;
use crate::tree::{path, NodeRepository};
use crate::{DriveError, Result};

/// One file to ingest.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Destination directory, `""` for the root.
    pub directory: String,
    /// Destination directory by node id, alternative to `directory`.
    pub parent_id: Option<i64>,
    /// File name (single segment).
    pub name: String,
    /// Size announced by the client, checked against the content.
    pub declared_size: Option<i64>,
    pub content: Vec<u8>,
}

/// Result of a successful ingest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingested {
    pub id: i64,
    pub path: String,
    pub size: i64,
    /// False when an existing file was overwritten.
    pub created: bool,
}

/// Writes uploaded bytes through the mirror and records them as nodes.
pub struct IngestionPipeline<'a> {
    pool: &'a DbPool,
    mirror: &'a FilesystemMirror,
}

impl<'a> IngestionPipeline<'a> {
    pub fn new(pool: &'a DbPool, mirror: &'a FilesystemMirror) -> Self {
        Self { pool, mirror }
    }

    /// Ingest one upload and return the node it landed in.
    pub async fn ingest(&self, upload: &Upload) -> Result<Ingested> {
        let repo = NodeRepository::new(self.pool);

        path::validate_name(&upload.name)?;
        let directory = self.resolve_directory(&repo, upload).await?;
        let target = path::join(&directory, &upload.name);

        let size = upload.content.len() as i64;
        if let Some(declared) = upload.declared_size {
            if declared != size {
                return Err(DriveError::Validation(format!(
                    "declared size {declared} does not match content length {size}"
                )));
            }
        }

        let existing = repo.get_by_path(&target).await?;
        if existing.as_ref().is_some_and(|n| n.is_dir) {
            return Err(DriveError::Conflict(format!("'{target}' is a directory")));
        }
        for dir in path::ancestors(&target) {
            if repo.get_by_path(dir).await?.is_some_and(|n| !n.is_dir) {
                return Err(DriveError::Conflict(format!("'{dir}' exists as a file")));
            }
        }

        let overwritten = self.mirror.write(&target, &upload.content)?;
        debug!(path = %target, size, overwritten, "upload bytes written");

        let upsert = match existing {
            Some(node) => repo.update_size(node.id, size).await.map(|()| (node.id, false)),
            None => repo.create_file(&target, size).await.map(|id| (id, true)),
        };

        match upsert {
            Ok((id, created)) => {
                info!(id, path = %target, size, created, "file ingested");
                Ok(Ingested {
                    id,
                    path: target,
                    size,
                    created,
                })
            }
            Err(e) => {
                if !overwritten {
                    match self.mirror.remove_entry(&target) {
                        Ok(_) => warn!(path = %target, "removed bytes after metadata failure"),
                        Err(cleanup) => error!(
                            path = %target,
                            error = %cleanup,
                            "could not remove bytes after metadata failure"
                        ),
                    }
                }
                Err(e)
            }
        }
    }

    /// Destination directory from either the path or the parent id.
    async fn resolve_directory(
        &self,
        repo: &NodeRepository<'_>,
        upload: &Upload,
    ) -> Result<String> {
        let directory = path::normalize_dir(&upload.directory)?;

        let Some(parent_id) = upload.parent_id else {
            return Ok(directory);
        };

        let parent = repo
            .get_by_id(parent_id)
            .await?
            .ok_or_else(|| DriveError::NotFound(format!("parent node {parent_id}")))?;
        if !parent.is_dir {
            return Err(DriveError::InvalidPath(format!(
                "parent '{}' is not a directory",
                parent.path
            )));
        }
        if !directory.is_empty() && directory != parent.path {
            return Err(DriveError::Validation(
                "path and parent_id name different directories".to_string(),
            ));
        }
        Ok(parent.path)
    }
}
