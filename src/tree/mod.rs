//! Hierarchical metadata: nodes plus their transitive-closure edges.

pub mod builder;
pub mod node;
pub mod path;
pub mod repository;

pub use builder::{FileTree, TreeBuilder, TreeNode};
pub use node::{ClosureEdge, ClosureRow, DeletedSubtree, NewNode, Node, NodeKind, SubtreeEntry};
pub use repository::{NodeRepository, PendingRelocation};
