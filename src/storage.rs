// storage.rs — Durable key-value blobs (configuration + history) in a bundled SQLite file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};

use crate::config;

pub struct KvStore {
    path: Option<PathBuf>,
    conn: Connection,
}

fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // PRAGMA statements do NOT reliably accept parameters, so we must interpolate.
    conn.execute_batch(&format!(
        "\
PRAGMA journal_mode = WAL;\n\
PRAGMA synchronous = NORMAL;\n\
PRAGMA busy_timeout = {busy_timeout};\n\
",
        busy_timeout = config::storage::PRAGMA_BUSY_TIMEOUT_MS,
    ))?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updatedAtMs INTEGER NOT NULL
        );
        "#,
    )?;
    Ok(())
}

impl KvStore {
    pub fn open_or_create(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
        let db_path = data_dir.join(config::storage::DB_FILE_NAME);

        log::info!("Opening key-value store");
        log::info!("  DB Path: {}", db_path.display());

        let conn = Connection::open(&db_path).with_context(|| format!("open db {}", db_path.display()))?;
        init_schema(&conn)?;

        let keys: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |r| r.get(0))?;
        log::info!("Key-value store ready: {} keys", keys);

        Ok(Self { path: Some(db_path), conn })
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { path: None, conn })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let v = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |r| r.get(0))
            .optional()
            .with_context(|| format!("failed loading key {key}"))?;
        Ok(v)
    }

    pub fn save(&self, key: &str, blob: &str) -> anyhow::Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                r#"
                INSERT INTO kv (key, value, updatedAtMs) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updatedAtMs = excluded.updatedAtMs
                "#,
                params![key, blob, now_ms],
            )
            .with_context(|| format!("failed saving key {key}"))?;
        log::debug!("Saved {} ({} bytes)", key, blob.len());
        Ok(())
    }

    /// Load and deserialize; absent key yields `None`. A present but unreadable blob is an error.
    pub fn load_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let Some(blob) = self.load(key)? else {
            return Ok(None);
        };
        let v = serde_json::from_str(&blob).with_context(|| format!("stored value for {key} is not valid"))?;
        Ok(Some(v))
    }

    pub fn save_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let blob = serde_json::to_string(value).with_context(|| format!("failed serializing {key}"))?;
        self.save(key, &blob)
    }
}
