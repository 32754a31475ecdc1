//! Response DTOs for Web API.

use serde::Serialize;

use crate::drive::{CreatedDir, Deleted, Ingested, Relocated};
use crate::tree::{path, ClosureRow, Node, SubtreeEntry};

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Counted list wrapper used by the debug endpoints.
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T: Serialize> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T: Serialize> ItemsResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            count: items.len(),
            items,
        }
    }
}

// ============================================================================
// Nodes
// ============================================================================

/// One node in a flat listing.
#[derive(Debug, Serialize)]
pub struct NodeResponse {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size: i64,
    pub is_dir: bool,
    pub created_at: String,
}

impl From<Node> for NodeResponse {
    fn from(node: Node) -> Self {
        Self {
            name: node.name().to_string(),
            id: node.id,
            path: node.path,
            size: node.size,
            is_dir: node.is_dir,
            created_at: node.created_at,
        }
    }
}

/// Upload result.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: i64,
    pub path: String,
    pub name: String,
    pub size: i64,
    /// False when an existing file was overwritten.
    pub created: bool,
}

impl From<Ingested> for UploadResponse {
    fn from(ingested: Ingested) -> Self {
        Self {
            name: path::base_name(&ingested.path).to_string(),
            id: ingested.id,
            path: ingested.path,
            size: ingested.size,
            created: ingested.created,
        }
    }
}

/// Directory creation result.
#[derive(Debug, Serialize)]
pub struct CreateDirResponse {
    pub id: i64,
    pub path: String,
    pub created: bool,
    pub message: String,
}

impl From<CreatedDir> for CreateDirResponse {
    fn from(dir: CreatedDir) -> Self {
        let message = if dir.created {
            "directory created"
        } else {
            "directory already exists"
        };
        Self {
            id: dir.id,
            path: dir.path,
            created: dir.created,
            message: message.to_string(),
        }
    }
}

/// Rename or move result.
#[derive(Debug, Serialize)]
pub struct RelocateResponse {
    pub id: i64,
    pub old_path: String,
    pub new_path: String,
}

impl From<Relocated> for RelocateResponse {
    fn from(relocated: Relocated) -> Self {
        Self {
            id: relocated.id,
            old_path: relocated.old_path,
            new_path: relocated.new_path,
        }
    }
}

/// Deletion result.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub path: String,
    pub nodes_removed: u64,
    /// Present when the filesystem may still hold the deleted entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl From<Deleted> for DeleteResponse {
    fn from(deleted: Deleted) -> Self {
        Self {
            path: deleted.path,
            nodes_removed: deleted.nodes_removed,
            warning: deleted.warning,
        }
    }
}

// ============================================================================
// Debug introspection
// ============================================================================

/// `GET /debug/nodes`.
pub type DebugNodesResponse = ItemsResponse<NodeResponse>;

/// `GET /debug/closure`.
pub type DebugClosureResponse = ItemsResponse<ClosureRow>;

/// `GET /debug/subtree/{id}`.
#[derive(Debug, Serialize)]
pub struct DebugSubtreeResponse {
    pub root_id: i64,
    pub count: usize,
    pub items: Vec<SubtreeEntry>,
}
