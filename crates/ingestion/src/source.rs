//! Row sources: where raw observation rows come from.
//!
//! The production store is a remote wide-column table. Locally we offer an
//! in-memory source for tests and replays, and a SQLite file with the same
//! row layout.

use crate::rows::{row_key, ColumnVersion, RawRow, RowScan};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;
use trends_core::{Error, RawObservation, Result};

/// Anything that can answer a row scan.
pub trait RowSource {
    /// Return the rows in key order, each with its versions newest first.
    fn scan(&self, scan: &RowScan) -> Result<Vec<RawRow>>;
}

/// In-memory row store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    /// (row key, probe id) -> versions.
    cells: BTreeMap<(String, i64), Vec<ColumnVersion>>,
}

impl MemoryRowSource {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one version of a probe column.
    pub fn insert(&mut self, key: impl Into<String>, probe_id: i64, version: i64, value: Vec<u8>) {
        self.cells
            .entry((key.into(), probe_id))
            .or_default()
            .push(ColumnVersion { version, value });
    }

    /// Store an observation under its natural row key.
    pub fn insert_observation(&mut self, msm_id: i64, obs: &RawObservation) -> Result<()> {
        let key = row_key(msm_id, obs.timestamp)?;
        let value = serde_json::to_vec(obs)?;
        let version = self
            .cells
            .get(&(key.clone(), obs.probe_id))
            .map_or(0, |v| v.len() as i64);
        self.insert(key, obs.probe_id, version, value);
        Ok(())
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl RowSource for MemoryRowSource {
    fn scan(&self, scan: &RowScan) -> Result<Vec<RawRow>> {
        let rows: Vec<RawRow> = self
            .cells
            .iter()
            .filter(|((key, probe), _)| *probe == scan.probe_id && scan.contains(key))
            .map(|((key, _), versions)| {
                let mut versions = versions.clone();
                versions.sort_by(|a, b| b.version.cmp(&a.version));
                RawRow {
                    key: key.clone(),
                    versions,
                }
            })
            .collect();
        debug!(probe_id = scan.probe_id, rows = rows.len(), "memory scan");
        Ok(rows)
    }
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::storage(e.to_string())
}

/// SQLite-backed row store.
pub struct SqliteRowSource {
    conn: Connection,
}

impl SqliteRowSource {
    /// Open (and initialize) a store file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::with_connection(conn)
    }

    /// Open a transient in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blobs (
                row_key  TEXT    NOT NULL,
                probe_id INTEGER NOT NULL,
                version  INTEGER NOT NULL,
                value    BLOB    NOT NULL,
                PRIMARY KEY (row_key, probe_id, version)
            );",
        )
        .map_err(storage_err)?;
        Ok(Self { conn })
    }

    /// Store one version of a probe column.
    pub fn insert(&self, key: &str, probe_id: i64, version: i64, value: &[u8]) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO blobs (row_key, probe_id, version, value) VALUES (?1, ?2, ?3, ?4)",
                params![key, probe_id, version, value],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    /// Store an observation under its natural row key, as the next version.
    pub fn insert_observation(&self, msm_id: i64, obs: &RawObservation) -> Result<()> {
        let key = row_key(msm_id, obs.timestamp)?;
        let value = serde_json::to_vec(obs)?;
        let version: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM blobs WHERE row_key = ?1 AND probe_id = ?2",
                params![key, obs.probe_id],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        self.insert(&key, obs.probe_id, version, &value)
    }
}

impl RowSource for SqliteRowSource {
    fn scan(&self, scan: &RowScan) -> Result<Vec<RawRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT row_key, version, value FROM blobs
                 WHERE probe_id = ?1 AND row_key >= ?2 AND row_key < ?3
                 ORDER BY row_key ASC, version DESC",
            )
            .map_err(storage_err)?;
        let cells = stmt
            .query_map(params![scan.probe_id, scan.start_row, scan.stop_row], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Vec<u8>>(2)?,
                ))
            })
            .map_err(storage_err)?;

        let mut rows: Vec<RawRow> = Vec::new();
        for cell in cells {
            let (key, version, value) = cell.map_err(storage_err)?;
            let version = ColumnVersion { version, value };
            match rows.last_mut() {
                Some(row) if row.key == key => row.versions.push(version),
                _ => rows.push(RawRow {
                    key,
                    versions: vec![version],
                }),
            }
        }
        debug!(probe_id = scan.probe_id, rows = rows.len(), "sqlite scan");
        Ok(rows)
    }
}
