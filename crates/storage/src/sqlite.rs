use rusqlite::{Connection, OptionalExtension, Transaction, params};
use tracing::debug;

use tracegraph_core::{
    CODE_LABEL, CONTAINED_BY, ChangeKind, ChangeRecord, Entity, IMPLEMENTS, Link, Node, NodeKey,
    PACKAGE_LABEL, PassId, Source, Version,
};

use crate::error::StorageError;
use crate::traits::{GraphStore, GraphWrite, History, PassRecord};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

pub struct SqliteGraphStore {
    conn: Connection,
}

impl SqliteGraphStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Raw row of an entity joined with one (optional) change record.
type ChangeColumns = (
    Option<String>,
    Option<i64>,
    Option<Vec<u8>>,
    Option<String>,
);

fn read_change(cols: ChangeColumns) -> Result<Option<ChangeRecord>, StorageError> {
    match cols {
        (Some(kind), Some(version), data, label) => Ok(Some(ChangeRecord {
            kind: ChangeKind::parse(&kind)?,
            version,
            data,
            label,
        })),
        (None, None, _, _) => Ok(None),
        _ => Err(StorageError::Serialization(
            "change record with missing kind or version".into(),
        )),
    }
}

/// Fold ordered (entity, change) rows into one history per entity.
fn group_histories<T: Entity>(
    rows: Vec<(T, ChangeColumns)>,
) -> Result<Vec<History<T>>, StorageError> {
    let mut out: Vec<History<T>> = Vec::new();
    for (entity, cols) in rows {
        let change = read_change(cols)?;
        let same = out
            .last()
            .is_some_and(|h| h.entity.key() == entity.key());
        if !same {
            out.push(History::new(entity));
        }
        if let (Some(change), Some(history)) = (change, out.last_mut()) {
            history.changes.push(change);
        }
    }
    Ok(out)
}

fn materialize_write(tx: &Transaction, write: &GraphWrite) -> Result<(), StorageError> {
    match write {
        GraphWrite::MergeNode(node) => {
            tx.execute(
                "INSERT INTO nodes (id, node_type, data) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO NOTHING",
                params![node.id.as_str(), node.node_type, node.data],
            )?;
        }

        GraphWrite::MergeLink(link) => {
            tx.execute(
                "INSERT INTO links (source_id, target_id, kind) VALUES (?1, ?2, ?3)
                 ON CONFLICT(source_id, target_id) DO NOTHING",
                params![link.source.as_str(), link.target.as_str(), link.kind],
            )?;
        }

        GraphWrite::MergeSource(source) => {
            tx.execute(
                "INSERT OR IGNORE INTO packages (issue_id, package) VALUES (?1, ?2)",
                params![source.issue.as_str(), source.package],
            )?;
            tx.execute(
                "INSERT INTO code_files (issue_id, package, file, commit_hash) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(issue_id, package, file) DO NOTHING",
                params![source.issue.as_str(), source.package, source.file, source.commit],
            )?;
        }

        GraphWrite::LogNodeChange { id, change } => {
            tx.execute(
                "INSERT INTO node_updates (node_id, change_kind, version, data, label)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.as_str(),
                    change.kind.as_str(),
                    change.version,
                    change.data.as_deref(),
                    change.label.as_deref(),
                ],
            )?;
        }

        GraphWrite::LogLinkChange { key, change } => {
            tx.execute(
                "INSERT INTO link_updates (source_id, target_id, change_kind, version, data, label)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    key.source.as_str(),
                    key.target.as_str(),
                    change.kind.as_str(),
                    change.version,
                    change.data.as_deref(),
                    change.label.as_deref(),
                ],
            )?;
        }

        GraphWrite::LogSourceChange { key, change } => {
            tx.execute(
                "INSERT INTO source_updates (issue_id, package, file, change_kind, version, data, label)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key.issue.as_str(),
                    key.package,
                    key.file,
                    change.kind.as_str(),
                    change.version,
                    change.data.as_deref(),
                    change.label.as_deref(),
                ],
            )?;
        }

        GraphWrite::DeleteNode(id) => {
            tx.execute("DELETE FROM nodes WHERE id = ?1", params![id.as_str()])?;
        }

        GraphWrite::DeleteLink(key) => {
            tx.execute(
                "DELETE FROM links WHERE source_id = ?1 AND target_id = ?2",
                params![key.source.as_str(), key.target.as_str()],
            )?;
        }

        GraphWrite::DeleteSource(key) => {
            tx.execute(
                "DELETE FROM code_files WHERE issue_id = ?1 AND package = ?2 AND file = ?3",
                params![key.issue.as_str(), key.package, key.file],
            )?;
            // The package level goes once its last file is gone.
            tx.execute(
                "DELETE FROM packages WHERE issue_id = ?1 AND package = ?2
                 AND NOT EXISTS (SELECT 1 FROM code_files WHERE issue_id = ?1 AND package = ?2)",
                params![key.issue.as_str(), key.package],
            )?;
        }

        GraphWrite::ClearChangesAt(version) => {
            tx.execute("DELETE FROM node_updates WHERE version = ?1", params![version])?;
            tx.execute("DELETE FROM link_updates WHERE version = ?1", params![version])?;
            tx.execute("DELETE FROM source_updates WHERE version = ?1", params![version])?;
        }

        GraphWrite::SetCheckpoint(version) => {
            tx.execute(
                "INSERT INTO checkpoint (id, version) VALUES (1, ?1)
                 ON CONFLICT(id) DO UPDATE SET version = excluded.version",
                params![version],
            )?;
        }

        GraphWrite::EnsureTypeIndex(node_type) => {
            tx.execute(
                "INSERT OR IGNORE INTO node_types (node_type) VALUES (?1)",
                params![node_type],
            )?;
        }

        GraphWrite::PruneTypeIndex => {
            tx.execute(
                "DELETE FROM node_types WHERE node_type NOT IN (
                     SELECT node_type FROM nodes
                     UNION SELECT label FROM node_updates WHERE label IS NOT NULL
                 )",
                [],
            )?;
        }

        GraphWrite::RecordPass(pass) => {
            tx.execute(
                "INSERT INTO reconcile_passes (pass_id, version, added, removed, modified, recorded_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pass.pass_id.as_bytes().as_slice(),
                    pass.version,
                    pass.added as i64,
                    pass.removed as i64,
                    pass.modified as i64,
                    pass.recorded_at,
                ],
            )?;
        }
    }
    Ok(())
}

impl GraphStore for SqliteGraphStore {
    fn apply(&mut self, writes: &[GraphWrite]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for write in writes {
            materialize_write(&tx, write)?;
        }
        tx.commit()?;
        debug!(writes = writes.len(), "graph writes committed");
        Ok(())
    }

    fn node_history(&self) -> Result<Vec<History<Node>>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT n.id, n.node_type, n.data, u.change_kind, u.version, u.data, u.label
             FROM nodes n LEFT JOIN node_updates u ON u.node_id = n.id
             ORDER BY n.id, u.version, u.rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let node = Node {
                    id: NodeKey::new(row.get::<_, String>(0)?),
                    node_type: row.get(1)?,
                    data: row.get(2)?,
                };
                let change: ChangeColumns = (row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?);
                Ok((node, change))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        group_histories(rows)
    }

    fn link_history(&self) -> Result<Vec<History<Link>>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT l.source_id, l.kind, l.target_id, u.change_kind, u.version, u.data, u.label
             FROM links l LEFT JOIN link_updates u
               ON u.source_id = l.source_id AND u.target_id = l.target_id
             ORDER BY l.source_id, l.target_id, u.version, u.rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let link = Link {
                    source: NodeKey::new(row.get::<_, String>(0)?),
                    kind: row.get(1)?,
                    target: NodeKey::new(row.get::<_, String>(2)?),
                };
                let change: ChangeColumns = (row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?);
                Ok((link, change))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        group_histories(rows)
    }

    fn source_history(&self) -> Result<Vec<History<Source>>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT c.package, c.file, c.commit_hash, c.issue_id, u.change_kind, u.version, u.data, u.label
             FROM code_files c LEFT JOIN source_updates u
               ON u.issue_id = c.issue_id AND u.package = c.package AND u.file = c.file
             ORDER BY c.issue_id, c.package, c.file, u.version, u.rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let source = Source {
                    package: row.get(0)?,
                    file: row.get(1)?,
                    commit: row.get(2)?,
                    issue: NodeKey::new(row.get::<_, String>(3)?),
                };
                let change: ChangeColumns = (row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?);
                Ok((source, change))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        group_histories(rows)
    }

    fn checkpoint(&self) -> Result<Option<Version>, StorageError> {
        let version = self
            .conn
            .query_row("SELECT version FROM checkpoint WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(version)
    }

    fn stored_node_count(&self, node_type: Option<&str>) -> Result<u64, StorageError> {
        let count: i64 = match node_type {
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?,
            Some(PACKAGE_LABEL) => self
                .conn
                .query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?,
            Some(CODE_LABEL) => self
                .conn
                .query_row("SELECT COUNT(*) FROM code_files", [], |row| row.get(0))?,
            Some(t) => self.conn.query_row(
                "SELECT COUNT(*) FROM nodes WHERE node_type = ?1",
                params![t],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn stored_link_count(&self, kind: Option<&str>) -> Result<u64, StorageError> {
        let count: i64 = match kind {
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?,
            Some(IMPLEMENTS) => self
                .conn
                .query_row("SELECT COUNT(*) FROM packages", [], |row| row.get(0))?,
            Some(CONTAINED_BY) => self
                .conn
                .query_row("SELECT COUNT(*) FROM code_files", [], |row| row.get(0))?,
            Some(k) => self.conn.query_row(
                "SELECT COUNT(*) FROM links WHERE kind = ?1",
                params![k],
                |row| row.get(0),
            )?,
        };
        Ok(count as u64)
    }

    fn change_count_at(&self, version: Version) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM node_updates WHERE version = ?1)
                  + (SELECT COUNT(*) FROM link_updates WHERE version = ?1)
                  + (SELECT COUNT(*) FROM source_updates WHERE version = ?1)",
            params![version],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn indexed_types(&self) -> Result<Vec<String>, StorageError> {
        let mut stmt = self
            .conn
            .prepare("SELECT node_type FROM node_types ORDER BY node_type")?;
        let types = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(types)
    }

    fn pass_history(&self) -> Result<Vec<PassRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT pass_id, version, added, removed, modified, recorded_at
             FROM reconcile_passes ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let pass_id: Vec<u8> = row.get(0)?;
                let version: i64 = row.get(1)?;
                let added: i64 = row.get(2)?;
                let removed: i64 = row.get(3)?;
                let modified: i64 = row.get(4)?;
                let recorded_at: i64 = row.get(5)?;
                Ok((pass_id, version, added, removed, modified, recorded_at))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut result = Vec::new();
        for (pass_id, version, added, removed, modified, recorded_at) in rows {
            result.push(PassRecord {
                pass_id: PassId::from_bytes(to_array::<16>(pass_id, "pass_id")?),
                version,
                added: added as u64,
                removed: removed as u64,
                modified: modified as u64,
                recorded_at,
            });
        }
        Ok(result)
    }

    fn clear_all(&mut self) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM source_updates;
            DELETE FROM link_updates;
            DELETE FROM node_updates;
            DELETE FROM code_files;
            DELETE FROM packages;
            DELETE FROM links;
            DELETE FROM nodes;
            DELETE FROM node_types;
            DELETE FROM checkpoint;
            DELETE FROM reconcile_passes;
        ",
        )?;
        tx.commit()?;
        Ok(())
    }
}
