//! Node repository: the flat node table plus its transitive-closure edges.
//!
//! Every structural mutation runs in exactly one transaction. Moves and
//! renames can be split in two ([`NodeRepository::prepare_move`] then
//! [`PendingRelocation::commit`]) so that a filesystem step can run between
//! the statements and the commit.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection, Transaction};
use tracing::{debug, info};

use super::node::{ClosureEdge, ClosureRow, DeletedSubtree, NewNode, Node, SubtreeEntry};
use super::path;
use crate::db::DbPool;
use crate::{DriveError, Result};

const SELECT_NODE: &str = "SELECT id, path, size, is_dir, created_at FROM nodes";

/// Ids bound per DELETE, below SQLite's default limit of 999 parameters.
const DELETE_BATCH: usize = 500;

async fn find_by_path(conn: &mut SqliteConnection, path: &str) -> Result<Option<Node>> {
    let node = sqlx::query_as::<_, Node>(&format!("{SELECT_NODE} WHERE path = ?"))
        .bind(path)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(node)
}

async fn require_by_path(conn: &mut SqliteConnection, path: &str) -> Result<Node> {
    find_by_path(conn, path)
        .await?
        .ok_or_else(|| DriveError::NotFound(format!("node '{path}'")))
}

/// Insert a node, its self-edge and, when the parent resolves, the parent's
/// ancestor chain extended by one.
async fn insert_node(conn: &mut SqliteConnection, new: &NewNode) -> Result<i64> {
    path::validate_path(&new.path)?;

    if find_by_path(conn, &new.path).await?.is_some() {
        return Err(DriveError::Conflict(format!("'{}' already exists", new.path)));
    }

    let parent = match new.parent_path.as_deref() {
        Some(parent_path) if !parent_path.is_empty() => find_by_path(conn, parent_path).await?,
        _ => None,
    };

    if let Some(ref parent) = parent {
        if !parent.is_dir {
            return Err(DriveError::InvalidPath(format!(
                "parent '{}' is not a directory",
                parent.path
            )));
        }
        if path::parent_of(&new.path) != parent.path {
            return Err(DriveError::InvalidPath(format!(
                "'{}' is not a direct child of '{}'",
                new.path, parent.path
            )));
        }
    }

    let is_dir = new.kind.is_dir();
    let size = if is_dir { 0 } else { new.size };

    let id: i64 =
        sqlx::query_scalar("INSERT INTO nodes (path, size, is_dir) VALUES (?, ?, ?) RETURNING id")
            .bind(&new.path)
            .bind(size)
            .bind(is_dir)
            .fetch_one(&mut *conn)
            .await?;

    sqlx::query("INSERT INTO node_closure (ancestor, descendant, depth) VALUES (?, ?, 0)")
        .bind(id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if let Some(parent) = parent {
        sqlx::query(
            "INSERT INTO node_closure (ancestor, descendant, depth)
             SELECT ancestor, ?, depth + 1 FROM node_closure WHERE descendant = ?",
        )
        .bind(id)
        .bind(parent.id)
        .execute(&mut *conn)
        .await?;
    } else if new.parent_path.as_deref().is_some_and(|p| !p.is_empty()) {
        debug!(path = %new.path, "parent does not resolve, node created as a root");
    }

    Ok(id)
}

/// Walk `dir` from the root down, inserting every missing directory.
///
/// Returns the id of `dir` and whether it was inserted.
async fn ensure_directory_chain(conn: &mut SqliteConnection, dir: &str) -> Result<(i64, bool)> {
    let mut chain = path::ancestors(dir);
    chain.push(dir);

    let mut last = None;
    for step in chain {
        let entry = match find_by_path(conn, step).await? {
            Some(existing) if existing.is_dir => (existing.id, false),
            Some(_) => {
                return Err(DriveError::Conflict(format!("'{step}' exists as a file")));
            }
            None => (insert_node(conn, &NewNode::directory(step)).await?, true),
        };
        last = Some(entry);
    }

    last.ok_or_else(|| DriveError::InvalidPath("path cannot be empty".to_string()))
}

/// Rewrite the path of `root_id` and every node below it by prefix substitution.
async fn rewrite_subtree_paths(
    conn: &mut SqliteConnection,
    root_id: i64,
    old_path: &str,
    new_path: &str,
) -> Result<u64> {
    // substr() counts characters, not bytes.
    let suffix_start = old_path.chars().count() as i64 + 1;
    let result = sqlx::query(
        "UPDATE nodes SET path = ? || substr(path, ?)
         WHERE id IN (SELECT descendant FROM node_closure WHERE ancestor = ?)",
    )
    .bind(new_path)
    .bind(suffix_start)
    .bind(root_id)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

/// A rename or move whose metadata statements have run but not committed.
///
/// Dropping it without calling [`commit`](Self::commit) rolls the
/// transaction back.
pub struct PendingRelocation {
    tx: Transaction<'static, Sqlite>,
    node_id: i64,
    is_dir: bool,
    old_path: String,
    new_path: String,
}

impl PendingRelocation {
    pub fn node_id(&self) -> i64 {
        self.node_id
    }

    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn old_path(&self) -> &str {
        &self.old_path
    }

    pub fn new_path(&self) -> &str {
        &self.new_path
    }

    /// True when the target path equals the current one.
    pub fn is_noop(&self) -> bool {
        self.old_path == self.new_path
    }

    /// Commit the metadata change and return the new path.
    pub async fn commit(self) -> Result<String> {
        self.tx.commit().await?;
        Ok(self.new_path)
    }

    /// Abandon the metadata change.
    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

impl std::fmt::Debug for PendingRelocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRelocation")
            .field("node_id", &self.node_id)
            .field("old_path", &self.old_path)
            .field("new_path", &self.new_path)
            .finish()
    }
}

/// Repository for node and closure operations.
pub struct NodeRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> NodeRepository<'a> {
    /// Create a new NodeRepository with the given database pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Get a node by path.
    pub async fn get_by_path(&self, path: &str) -> Result<Option<Node>> {
        let node = sqlx::query_as::<_, Node>(&format!("{SELECT_NODE} WHERE path = ?"))
            .bind(path)
            .fetch_optional(self.pool)
            .await?;
        Ok(node)
    }

    /// Get a node by id.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Node>> {
        let node = sqlx::query_as::<_, Node>(&format!("{SELECT_NODE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(node)
    }

    /// List every node ordered by id.
    pub async fn list_all(&self) -> Result<Vec<Node>> {
        let nodes = sqlx::query_as::<_, Node>(&format!("{SELECT_NODE} ORDER BY id"))
            .fetch_all(self.pool)
            .await?;
        Ok(nodes)
    }

    /// Count all nodes.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// List every closure edge.
    pub async fn list_edges(&self) -> Result<Vec<ClosureEdge>> {
        let edges = sqlx::query_as::<_, ClosureEdge>(
            "SELECT ancestor, descendant, depth FROM node_closure
             ORDER BY ancestor, depth, descendant",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(edges)
    }

    /// List closure edges at one depth (1 = parent/child pairs).
    pub async fn list_edges_at_depth(&self, depth: i64) -> Result<Vec<ClosureEdge>> {
        let edges = sqlx::query_as::<_, ClosureEdge>(
            "SELECT ancestor, descendant, depth FROM node_closure
             WHERE depth = ? ORDER BY ancestor, descendant",
        )
        .bind(depth)
        .fetch_all(self.pool)
        .await?;
        Ok(edges)
    }

    /// Closure edges joined with both endpoint nodes.
    pub async fn closure_rows(&self) -> Result<Vec<ClosureRow>> {
        let rows = sqlx::query_as::<_, ClosureRow>(
            "SELECT c.ancestor, c.descendant, c.depth,
                    a.path AS ancestor_path,
                    d.path AS descendant_path,
                    d.size AS descendant_size
             FROM node_closure c
             JOIN nodes a ON c.ancestor = a.id
             JOIN nodes d ON c.descendant = d.id
             ORDER BY c.ancestor, c.depth, c.descendant",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// The subtree rooted at `id`, the root itself included at depth 0.
    pub async fn subtree(&self, id: i64) -> Result<Vec<SubtreeEntry>> {
        let entries = sqlx::query_as::<_, SubtreeEntry>(
            "SELECT n.id, n.path, n.size, n.is_dir, c.depth
             FROM nodes n
             JOIN node_closure c ON n.id = c.descendant
             WHERE c.ancestor = ?
             ORDER BY c.depth, n.id",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?;
        Ok(entries)
    }

    /// Create a node and wire its closure edges in one transaction.
    ///
    /// Fails with `Conflict` if the path already exists.
    pub async fn create_node(&self, new: &NewNode) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = insert_node(&mut tx, new).await?;
        tx.commit().await?;

        debug!(id, path = %new.path, is_dir = new.kind.is_dir(), "node created");
        Ok(id)
    }

    /// Make sure `path` and all of its ancestors exist as directories.
    ///
    /// Returns the directory id and whether `path` itself was created.
    /// Fails with `Conflict` if any of them exists as a file.
    pub async fn ensure_directory(&self, path: &str) -> Result<(i64, bool)> {
        path::validate_path(path)?;

        let mut tx = self.pool.begin().await?;
        let entry = ensure_directory_chain(&mut tx, path).await?;
        tx.commit().await?;

        Ok(entry)
    }

    /// Create a file node together with any missing ancestor directories.
    ///
    /// Either every row lands or none does.
    pub async fn create_file(&self, path: &str, size: i64) -> Result<i64> {
        path::validate_path(path)?;

        let mut tx = self.pool.begin().await?;
        let parent = path::parent_of(path);
        if !parent.is_empty() {
            ensure_directory_chain(&mut tx, parent).await?;
        }
        let id = insert_node(&mut tx, &NewNode::file(path, size)).await?;
        tx.commit().await?;

        debug!(id, path = %path, size, "file node created");
        Ok(id)
    }

    /// Update a file's size.
    pub async fn update_size(&self, id: i64, size: i64) -> Result<()> {
        let result = sqlx::query("UPDATE nodes SET size = ? WHERE id = ? AND is_dir = 0")
            .bind(size)
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DriveError::NotFound(format!("file node {id}")));
        }
        Ok(())
    }

    /// Stage a rename of the last segment of `path` to `new_name`.
    ///
    /// Only paths change; closure edges are untouched since ancestry does not.
    pub async fn prepare_rename(&self, path: &str, new_name: &str) -> Result<PendingRelocation> {
        path::validate_path(path)?;
        path::validate_name(new_name)?;

        let mut tx = self.pool.begin().await?;
        let node = require_by_path(&mut tx, path).await?;
        let new_path = path::join(path::parent_of(path), new_name);

        if new_path != node.path {
            if find_by_path(&mut tx, &new_path).await?.is_some() {
                return Err(DriveError::Conflict(format!("'{new_path}' already exists")));
            }
            rewrite_subtree_paths(&mut tx, node.id, &node.path, &new_path).await?;
        }

        Ok(PendingRelocation {
            tx,
            node_id: node.id,
            is_dir: node.is_dir,
            old_path: node.path,
            new_path,
        })
    }

    /// Stage a move of `path` under `new_parent` (`""` for the root).
    ///
    /// Closure rows from the node's strict ancestors into its subtree are
    /// removed, rows from the new parent's ancestor chain are added, and the
    /// subtree's paths are rewritten.
    pub async fn prepare_move(&self, path: &str, new_parent: &str) -> Result<PendingRelocation> {
        path::validate_path(path)?;
        let new_parent = path::normalize_dir(new_parent)?;

        let mut tx = self.pool.begin().await?;
        let node = require_by_path(&mut tx, path).await?;

        let parent = if new_parent.is_empty() {
            None
        } else {
            if path::is_within(&new_parent, &node.path) {
                return Err(DriveError::InvalidPath(format!(
                    "cannot move '{}' into its own subtree",
                    node.path
                )));
            }
            let parent = find_by_path(&mut tx, &new_parent)
                .await?
                .ok_or_else(|| DriveError::NotFound(format!("parent '{new_parent}'")))?;
            if !parent.is_dir {
                return Err(DriveError::InvalidPath(format!(
                    "'{new_parent}' is not a directory"
                )));
            }
            Some(parent)
        };

        let new_path = path::join(&new_parent, node.name());
        if new_path == node.path {
            return Ok(PendingRelocation {
                tx,
                node_id: node.id,
                is_dir: node.is_dir,
                old_path: node.path,
                new_path,
            });
        }

        if find_by_path(&mut tx, &new_path).await?.is_some() {
            return Err(DriveError::Conflict(format!("'{new_path}' already exists")));
        }

        sqlx::query(
            "DELETE FROM node_closure
             WHERE descendant IN (SELECT descendant FROM node_closure WHERE ancestor = ?)
               AND ancestor IN (SELECT ancestor FROM node_closure
                                WHERE descendant = ? AND ancestor != descendant)",
        )
        .bind(node.id)
        .bind(node.id)
        .execute(&mut *tx)
        .await?;

        if let Some(ref parent) = parent {
            sqlx::query(
                "INSERT INTO node_closure (ancestor, descendant, depth)
                 SELECT p.ancestor, s.descendant, p.depth + s.depth + 1
                 FROM node_closure p, node_closure s
                 WHERE p.descendant = ? AND s.ancestor = ?",
            )
            .bind(parent.id)
            .bind(node.id)
            .execute(&mut *tx)
            .await?;
        }

        rewrite_subtree_paths(&mut tx, node.id, &node.path, &new_path).await?;

        Ok(PendingRelocation {
            tx,
            node_id: node.id,
            is_dir: node.is_dir,
            old_path: node.path,
            new_path,
        })
    }

    /// Rename a node (metadata only) and return its new path.
    pub async fn rename_node(&self, path: &str, new_name: &str) -> Result<String> {
        let pending = self.prepare_rename(path, new_name).await?;
        let new_path = pending.commit().await?;
        info!(from = %path, to = %new_path, "node renamed");
        Ok(new_path)
    }

    /// Move a node (metadata only) and return its new path.
    pub async fn move_node(&self, path: &str, new_parent: &str) -> Result<String> {
        let pending = self.prepare_move(path, new_parent).await?;
        let new_path = pending.commit().await?;
        info!(from = %path, to = %new_path, "node moved");
        Ok(new_path)
    }

    /// Delete `path` and everything below it.
    ///
    /// Closure rows naming any removed node go with it through the foreign
    /// key cascade.
    pub async fn delete_subtree(&self, path: &str) -> Result<DeletedSubtree> {
        path::validate_path(path)?;

        let mut tx = self.pool.begin().await?;
        let node = require_by_path(&mut tx, path).await?;

        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT descendant FROM node_closure WHERE ancestor = ?")
                .bind(node.id)
                .fetch_all(&mut *tx)
                .await?;

        let mut nodes_removed = 0;
        for chunk in ids.chunks(DELETE_BATCH) {
            let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM nodes WHERE id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            nodes_removed += query.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        info!(path = %node.path, nodes_removed, "subtree deleted");
        Ok(DeletedSubtree {
            root_id: node.id,
            was_dir: node.is_dir,
            nodes_removed,
        })
    }

    /// Delete a single node that has nothing below it.
    ///
    /// Fails with `Conflict` for a non-empty directory.
    pub async fn delete_leaf(&self, path: &str) -> Result<DeletedSubtree> {
        path::validate_path(path)?;

        let mut tx = self.pool.begin().await?;
        let node = require_by_path(&mut tx, path).await?;

        let below: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM node_closure WHERE ancestor = ? AND depth > 0",
        )
        .bind(node.id)
        .fetch_one(&mut *tx)
        .await?;

        if below > 0 {
            return Err(DriveError::Conflict(format!(
                "directory '{}' is not empty",
                node.path
            )));
        }

        let nodes_removed = sqlx::query("DELETE FROM nodes WHERE id = ?")
            .bind(node.id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        info!(path = %node.path, "node deleted");
        Ok(DeletedSubtree {
            root_id: node.id,
            was_dir: node.is_dir,
            nodes_removed,
        })
    }
}
