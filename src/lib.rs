//! singledrive - single-node file storage service
//!
//! Files and directories are stored as plain entries under a storage root,
//! while their hierarchy is recorded in SQLite as a node table plus a
//! transitive-closure edge table.

pub mod config;
pub mod db;
pub mod drive;
pub mod error;
pub mod logging;
pub mod tree;
pub mod web;

pub use config::Config;
pub use db::{Database, DbPool};
pub use drive::{DriveService, FilesystemMirror, IngestionPipeline, Upload};
pub use error::{DriveError, Result};
pub use tree::{FileTree, NewNode, Node, NodeRepository, TreeBuilder};
pub use web::WebServer;
