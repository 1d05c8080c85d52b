use crate::error::Result;
use crate::structs::Snapshot;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Latest raw payload per term key, kept in a SQLite file.
///
/// Single process, sequential access. Two overlapping invocations may
/// interleave their read and write; nothing guards against that.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        debug!("snapshot store opened at {}", path.display());
        Self::init(conn)
    }

    /// A store that lives only as long as the value.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                key TEXT PRIMARY KEY,
                captured_at TEXT NOT NULL,
                payload TEXT NOT NULL
            )",
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<Snapshot>> {
        let row = self
            .conn
            .query_row(
                "SELECT captured_at, payload FROM snapshots WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(captured_at, raw_payload)| Snapshot {
            key: key.to_string(),
            captured_at: parse_timestamp(&captured_at),
            raw_payload,
        }))
    }

    /// Replaces whatever is stored under `key`, stamped with the current time.
    pub fn put(&self, key: &str, raw_payload: &str) -> Result<Snapshot> {
        let captured_at = Utc::now();
        self.conn.execute(
            "INSERT INTO snapshots (key, captured_at, payload) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET captured_at = excluded.captured_at,
                                            payload = excluded.payload",
            params![key, captured_at.to_rfc3339(), raw_payload],
        )?;
        debug!("snapshot stored for {key} ({} bytes)", raw_payload.len());
        Ok(Snapshot {
            key: key.to_string(),
            captured_at,
            raw_payload: raw_payload.to_string(),
        })
    }

    pub fn remove(&self, key: &str) -> Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM snapshots WHERE key = ?1", params![key])?;
        Ok(n > 0)
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM snapshots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }

    /// Closes the file and reports any error doing so. Dropping the store
    /// also closes it, silently.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e)?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(value) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(err) => {
            warn!("invalid snapshot timestamp {value:?}: {err}");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}
