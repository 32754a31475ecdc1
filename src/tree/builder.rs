//! Nested tree view assembled from the flat node table and depth-1 edges.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::node::Node;
use super::repository::NodeRepository;
use crate::db::DbPool;
use crate::Result;

/// A node with its children attached.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: i64,
    pub name: String,
    pub path: String,
    pub size: i64,
    pub is_dir: bool,
    pub children: Vec<TreeNode>,
}

/// The whole drive as a forest.
#[derive(Debug, Clone, Serialize)]
pub struct FileTree {
    /// Number of nodes in the forest.
    pub total: usize,
    pub roots: Vec<TreeNode>,
}

/// Read-only builder for [`FileTree`].
pub struct TreeBuilder<'a> {
    pool: &'a DbPool,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Load every node and parent/child edge and nest them.
    pub async fn build_tree(&self) -> Result<FileTree> {
        let repo = NodeRepository::new(self.pool);
        let nodes = repo.list_all().await?;
        let links = repo
            .list_edges_at_depth(1)
            .await?
            .into_iter()
            .map(|edge| (edge.ancestor, edge.descendant));

        Ok(assemble(nodes, links))
    }
}

/// Nest `nodes` using `(parent, child)` links. Nodes without a parent are roots.
/// Children keep the order of `nodes`.
pub fn assemble(nodes: Vec<Node>, links: impl IntoIterator<Item = (i64, i64)>) -> FileTree {
    let total = nodes.len();

    let mut parent_of: HashMap<i64, i64> = HashMap::new();
    for (parent, child) in links {
        parent_of.insert(child, parent);
    }

    let order: Vec<i64> = nodes.iter().map(|n| n.id).collect();
    let known: HashSet<i64> = order.iter().copied().collect();

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut root_ids = Vec::new();
    for id in &order {
        match parent_of.get(id) {
            Some(parent) if known.contains(parent) => {
                children.entry(*parent).or_default().push(*id)
            }
            _ => root_ids.push(*id),
        }
    }

    let mut by_id: HashMap<i64, Node> = nodes.into_iter().map(|n| (n.id, n)).collect();
    let roots = root_ids
        .into_iter()
        .filter_map(|id| attach(id, &mut by_id, &children))
        .collect();

    FileTree { total, roots }
}

fn attach(
    id: i64,
    by_id: &mut HashMap<i64, Node>,
    children: &HashMap<i64, Vec<i64>>,
) -> Option<TreeNode> {
    let node = by_id.remove(&id)?;
    let kids = children
        .get(&id)
        .map(|ids| {
            ids.iter()
                .filter_map(|child| attach(*child, by_id, children))
                .collect()
        })
        .unwrap_or_default();

    Some(TreeNode {
        id: node.id,
        name: node.name().to_string(),
        size: node.size,
        is_dir: node.is_dir,
        path: node.path,
        children: kids,
    })
}
