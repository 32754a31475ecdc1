//! API handlers for the drive.

pub mod debug;
pub mod drive;

pub use debug::*;
pub use drive::*;

use crate::drive::{DriveService, FilesystemMirror};
use crate::Database;

/// Shared state for all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Node store.
    pub db: Database,
    /// Byte storage.
    pub mirror: FilesystemMirror,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
}

impl AppState {
    /// Create a new AppState.
    pub fn new(db: Database, mirror: FilesystemMirror, max_upload_size: u64) -> Self {
        Self {
            db,
            mirror,
            max_upload_size,
        }
    }

    /// Drive service over this state.
    pub fn drive(&self) -> DriveService<'_> {
        DriveService::new(&self.db, &self.mirror)
    }
}
