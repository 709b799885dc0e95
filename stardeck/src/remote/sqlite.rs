use super::{derive_metadata, merge_upstream, Remote, RemoteError, Snapshot, SyncStats};
use crate::app::lock;
use crate::error::{Error, Result};
use crate::model::{ListKind, Record, RecordId};
use crate::mutation::Edit;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const TAG_ORDER_KEY: &str = "TAG_ORDER";
const LANGUAGE_ORDER_KEY: &str = "LANGUAGE_ORDER";
const LAST_SYNC_KEY: &str = "LAST_SUCCESSFUL_SYNC_AT";

/// A remote backed by a local SQLite file.
///
/// Records are stored as JSON rows in server order; orderings and the last
/// sync time live in a key/value settings table. `trigger_sync` reconciles
/// against an upstream JSON export of the starred list.
pub struct SqliteRemote {
    conn: Mutex<Connection>,
    upstream: Option<PathBuf>,
}

impl SqliteRemote {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS repos (
                id INTEGER PRIMARY KEY,
                position INTEGER NOT NULL,
                data_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_repos_position ON repos(position);

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value_json TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(SqliteRemote {
            conn: Mutex::new(conn),
            upstream: None,
        })
    }

    /// Set the upstream export `trigger_sync` reads.
    pub fn with_upstream(mut self, path: impl Into<PathBuf>) -> Self {
        self.upstream = Some(path.into());
        self
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        lock(&self.conn)
    }

    // ── Records ──────────────────────────────────────────────────────

    /// All records in stored order.
    pub fn records(&self) -> Result<Vec<Record>> {
        load_records(&self.conn())
    }

    pub fn record(&self, id: RecordId) -> Result<Option<Record>> {
        let conn = self.conn();
        let data: Option<String> = conn
            .query_row(
                "SELECT data_json FROM repos WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        data.map(|json| serde_json::from_str(&json).map_err(Error::from))
            .transpose()
    }

    /// Replace every stored record, keeping the given order.
    pub fn replace_all(&self, records: &[Record]) -> Result<()> {
        let mut conn = self.conn();
        write_records(&mut conn, records)
    }

    /// Load a JSON array of records from `path`, replacing what is stored.
    /// Returns the number of records imported.
    pub fn import(&self, path: &Path) -> Result<usize> {
        let records = read_export(path)?;
        self.replace_all(&records)?;
        log::info!("Imported {} records from {}", records.len(), path.display());
        Ok(records.len())
    }

    // ── Settings ─────────────────────────────────────────────────────

    pub fn order(&self, kind: ListKind) -> Result<Vec<String>> {
        Ok(get_setting(&self.conn(), order_key(kind))?.unwrap_or_default())
    }

    pub fn store_order(&self, kind: ListKind, order: &[String]) -> Result<()> {
        set_setting(&self.conn(), order_key(kind), &order)
    }

    pub fn last_successful_sync(&self) -> Result<Option<DateTime<Utc>>> {
        get_setting(&self.conn(), LAST_SYNC_KEY)
    }

    // ── Server-side operations ───────────────────────────────────────

    fn snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn();
        let records = load_records(&conn)?;
        let tags: Vec<String> = get_setting(&conn, TAG_ORDER_KEY)?.unwrap_or_default();
        let languages: Vec<String> = get_setting(&conn, LANGUAGE_ORDER_KEY)?.unwrap_or_default();
        let metadata = derive_metadata(&records, &tags, &languages);
        Ok(Snapshot { records, metadata })
    }

    fn patch(&self, id: RecordId, edit: &Edit) -> Result<Record> {
        edit.validate()
            .map_err(|e| RemoteError::rejected("VALIDATION_ERROR", e.to_string()))?;
        let mut record = self.record(id)?.ok_or_else(|| {
            RemoteError::rejected("REPO_NOT_FOUND", format!("Repository with id {id} not found"))
        })?;
        edit.apply(&mut record);
        let data_json = serde_json::to_string(&record)?;
        self.conn().execute(
            "UPDATE repos SET data_json = ?2 WHERE id = ?1",
            params![id, data_json],
        )?;
        Ok(record)
    }

    fn remove_tag(&self, name: &str) -> Result<()> {
        let conn = self.conn();
        let count = load_records(&conn)?
            .iter()
            .filter(|r| r.has_tag(name))
            .count();
        if count > 0 {
            return Err(RemoteError::rejected(
                "TAG_IN_USE",
                format!("Tag '{name}' is used by {count} repositories"),
            )
            .into());
        }
        let mut order: Vec<String> = get_setting(&conn, TAG_ORDER_KEY)?.unwrap_or_default();
        order.retain(|t| t != name);
        set_setting(&conn, TAG_ORDER_KEY, &order)
    }

    fn sync(&self) -> Result<SyncStats> {
        let path = self.upstream.as_deref().ok_or_else(|| {
            RemoteError::rejected("SYNC_SOURCE_MISSING", "No upstream export configured")
        })?;
        let upstream = read_export(path)?;

        let mut conn = self.conn();
        let local = load_records(&conn)?;
        let (merged, stats) = merge_upstream(&local, &upstream);
        write_records(&mut conn, &merged)?;
        set_setting(&conn, LAST_SYNC_KEY, &Utc::now())?;
        Ok(stats)
    }
}

#[async_trait]
impl Remote for SqliteRemote {
    async fn fetch_all(&self) -> std::result::Result<Snapshot, RemoteError> {
        self.snapshot().map_err(into_remote)
    }

    async fn patch_record(
        &self,
        id: RecordId,
        edit: &Edit,
    ) -> std::result::Result<Record, RemoteError> {
        self.patch(id, edit).map_err(into_remote)
    }

    async fn set_order(
        &self,
        kind: ListKind,
        order: &[String],
    ) -> std::result::Result<(), RemoteError> {
        self.store_order(kind, order).map_err(into_remote)
    }

    async fn delete_tag(&self, name: &str) -> std::result::Result<(), RemoteError> {
        self.remove_tag(name).map_err(into_remote)
    }

    async fn trigger_sync(&self) -> std::result::Result<SyncStats, RemoteError> {
        self.sync().map_err(into_remote)
    }
}

fn order_key(kind: ListKind) -> &'static str {
    match kind {
        ListKind::Tags => TAG_ORDER_KEY,
        ListKind::Languages => LANGUAGE_ORDER_KEY,
    }
}

/// Storage errors surface as server errors; a missing or unreadable upstream
/// file is the equivalent of the upstream being unreachable.
fn into_remote(err: Error) -> RemoteError {
    match err {
        Error::Remote(remote) => remote,
        Error::Io(io) => RemoteError::Unreachable(io.to_string()),
        other => RemoteError::server(other),
    }
}

fn read_export(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    let records = serde_json::from_str(&content)?;
    Ok(records)
}

fn load_records(conn: &Connection) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare("SELECT data_json FROM repos ORDER BY position, id")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut records = Vec::new();
    for row in rows {
        records.push(serde_json::from_str(&row?)?);
    }
    Ok(records)
}

fn write_records(conn: &mut Connection, records: &[Record]) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM repos", [])?;
    {
        let mut stmt =
            tx.prepare("INSERT OR REPLACE INTO repos (id, position, data_json) VALUES (?1, ?2, ?3)")?;
        for (position, record) in records.iter().enumerate() {
            let data_json = serde_json::to_string(record)?;
            stmt.execute(params![record.id, position as i64, data_json])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn get_setting<T: serde::de::DeserializeOwned>(conn: &Connection, key: &str) -> Result<Option<T>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    value
        .map(|json| serde_json::from_str(&json).map_err(Error::from))
        .transpose()
}

fn set_setting<T: serde::Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<()> {
    let value_json = serde_json::to_string(value)?;
    conn.execute(
        "INSERT OR REPLACE INTO settings (key, value_json) VALUES (?1, ?2)",
        params![key, value_json],
    )?;
    Ok(())
}
