use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    node_type TEXT NOT NULL CHECK (node_type NOT IN ('Package', 'Code')),
    data BLOB NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes (node_type);

CREATE TABLE IF NOT EXISTS node_types (
    node_type TEXT PRIMARY KEY,
    indexed_at INTEGER NOT NULL DEFAULT (CAST(unixepoch('now','subsec') * 1000 AS INTEGER))
);

CREATE TABLE IF NOT EXISTS links (
    source_id TEXT NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    PRIMARY KEY (source_id, target_id)
);
CREATE INDEX IF NOT EXISTS idx_links_target ON links (target_id);
CREATE INDEX IF NOT EXISTS idx_links_kind ON links (kind);

-- issue -IMPLEMENTS-> Package
CREATE TABLE IF NOT EXISTS packages (
    issue_id TEXT NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
    package TEXT NOT NULL,
    PRIMARY KEY (issue_id, package)
);

-- Package -CONTAINED_BY-> Code
CREATE TABLE IF NOT EXISTS code_files (
    issue_id TEXT NOT NULL,
    package TEXT NOT NULL,
    file TEXT NOT NULL,
    commit_hash TEXT NOT NULL,
    PRIMARY KEY (issue_id, package, file),
    FOREIGN KEY (issue_id, package) REFERENCES packages (issue_id, package) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS node_updates (
    rowid INTEGER PRIMARY KEY,
    node_id TEXT NOT NULL REFERENCES nodes (id) ON DELETE CASCADE,
    change_kind TEXT NOT NULL CHECK (change_kind IN ('ADD', 'REMOVE', 'MODIFIED')),
    version INTEGER NOT NULL,
    data BLOB,
    label TEXT
);
CREATE INDEX IF NOT EXISTS idx_node_updates_node ON node_updates (node_id, version);
CREATE INDEX IF NOT EXISTS idx_node_updates_version ON node_updates (version);

CREATE TABLE IF NOT EXISTS link_updates (
    rowid INTEGER PRIMARY KEY,
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    change_kind TEXT NOT NULL CHECK (change_kind IN ('ADD', 'REMOVE', 'MODIFIED')),
    version INTEGER NOT NULL,
    data BLOB,
    label TEXT,
    FOREIGN KEY (source_id, target_id) REFERENCES links (source_id, target_id) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_link_updates_link ON link_updates (source_id, target_id, version);
CREATE INDEX IF NOT EXISTS idx_link_updates_version ON link_updates (version);

CREATE TABLE IF NOT EXISTS source_updates (
    rowid INTEGER PRIMARY KEY,
    issue_id TEXT NOT NULL,
    package TEXT NOT NULL,
    file TEXT NOT NULL,
    change_kind TEXT NOT NULL CHECK (change_kind IN ('ADD', 'REMOVE', 'MODIFIED')),
    version INTEGER NOT NULL,
    data BLOB,
    label TEXT,
    FOREIGN KEY (issue_id, package, file) REFERENCES code_files (issue_id, package, file) ON DELETE CASCADE
);
CREATE INDEX IF NOT EXISTS idx_source_updates_source ON source_updates (issue_id, package, file, version);
CREATE INDEX IF NOT EXISTS idx_source_updates_version ON source_updates (version);

CREATE TABLE IF NOT EXISTS checkpoint (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS reconcile_passes (
    pass_id BLOB PRIMARY KEY CHECK (length(pass_id) = 16),
    version INTEGER NOT NULL,
    added INTEGER NOT NULL,
    removed INTEGER NOT NULL,
    modified INTEGER NOT NULL,
    recorded_at INTEGER NOT NULL
);
";
