//! Node and closure-edge row types.

use serde::Serialize;

use super::path;

/// A file or directory in the drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Node {
    /// Surrogate id, never reused.
    pub id: i64,
    /// Full logical path.
    pub path: String,
    /// Byte length for files, 0 for directories.
    pub size: i64,
    /// Explicit directory flag.
    pub is_dir: bool,
    /// When the node was created.
    pub created_at: String,
}

impl Node {
    /// Last path segment.
    pub fn name(&self) -> &str {
        path::base_name(&self.path)
    }
}

/// Kind of node to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Directory)
    }
}

/// Data for creating a new node.
#[derive(Debug, Clone)]
pub struct NewNode {
    /// Full logical path.
    pub path: String,
    /// Byte length (forced to 0 for directories).
    pub size: i64,
    /// File or directory.
    pub kind: NodeKind,
    /// Path of the parent to link under, `None` for a root node.
    pub parent_path: Option<String>,
}

impl NewNode {
    /// A file node; the parent is derived from the path.
    pub fn file(path: impl Into<String>, size: i64) -> Self {
        let path = path.into();
        let parent = path::parent_of(&path).to_string();
        Self {
            path,
            size,
            kind: NodeKind::File,
            parent_path: (!parent.is_empty()).then_some(parent),
        }
    }

    /// A directory node; the parent is derived from the path.
    pub fn directory(path: impl Into<String>) -> Self {
        let path = path.into();
        let parent = path::parent_of(&path).to_string();
        Self {
            path,
            size: 0,
            kind: NodeKind::Directory,
            parent_path: (!parent.is_empty()).then_some(parent),
        }
    }

    /// Override the parent to link under.
    pub fn with_parent(mut self, parent_path: Option<impl Into<String>>) -> Self {
        self.parent_path = parent_path.map(Into::into);
        self
    }
}

/// One (ancestor, descendant, depth) reachability row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::FromRow)]
pub struct ClosureEdge {
    pub ancestor: i64,
    pub descendant: i64,
    pub depth: i64,
}

impl ClosureEdge {
    pub fn new(ancestor: i64, descendant: i64, depth: i64) -> Self {
        Self {
            ancestor,
            descendant,
            depth,
        }
    }
}

/// Closure row joined with both endpoints, for introspection.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClosureRow {
    pub ancestor: i64,
    pub descendant: i64,
    pub depth: i64,
    pub ancestor_path: String,
    pub descendant_path: String,
    pub descendant_size: i64,
}

/// A member of a subtree with its distance from the subtree root.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SubtreeEntry {
    pub id: i64,
    pub path: String,
    pub size: i64,
    pub is_dir: bool,
    pub depth: i64,
}

/// Result of a subtree deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedSubtree {
    /// Id of the subtree root.
    pub root_id: i64,
    /// Whether the subtree root was a directory.
    pub was_dir: bool,
    /// Node rows removed (root included).
    pub nodes_removed: u64,
}
