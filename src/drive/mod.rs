//! Byte storage and the operations that keep it in step with the node tree.

pub mod archive;
pub mod ingest;
pub mod mirror;
pub mod service;

pub use archive::package_subtree;
pub use ingest::{Ingested, IngestionPipeline, Upload};
pub use mirror::{FileInfo, FilesystemMirror};
pub use service::{CreatedDir, Deleted, DownloadTarget, DriveService, Relocated};
