//! Database schema and migrations for singledrive.
//!
//! Migrations are applied in order when the database is first opened or
//! upgraded; the schema_version table tracks which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: node table and transitive-closure edge table
    r#"
-- One row per file or directory; path is the full logical path
CREATE TABLE nodes (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL UNIQUE,
    size        INTEGER NOT NULL DEFAULT 0,
    is_dir      INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One row per (ancestor, descendant) reachability pair, self-edges at depth 0
CREATE TABLE node_closure (
    ancestor    INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    descendant  INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
    depth       INTEGER NOT NULL,
    PRIMARY KEY (ancestor, descendant)
);

CREATE INDEX idx_closure_ancestor ON node_closure(ancestor);
CREATE INDEX idx_closure_descendant ON node_closure(descendant);
CREATE INDEX idx_closure_depth ON node_closure(depth);
"#,
];
