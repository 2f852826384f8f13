//! Key-value tables on top of SQLite.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use crate::StoreError;

/// A SQLite database holding one or more keyspaces.
#[derive(Debug)]
pub struct KvStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl KvStore {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        // Readers keep working while a scan writes.
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: None,
        })
    }

    /// Database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the keyspace `name`, creating it if needed.
    pub fn table<T>(&self, name: &str) -> Result<Table<'_, T>, StoreError> {
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(StoreError::InvalidTable {
                name: name.to_string(),
            });
        }

        self.conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" (key TEXT PRIMARY KEY NOT NULL, value TEXT NOT NULL)"
        ))?;

        Ok(Table {
            conn: &self.conn,
            name: name.to_string(),
            _marker: PhantomData,
        })
    }

    /// Run `f` in a single transaction: all of its writes land, or none do.
    pub fn atomically<R, E>(&self, f: impl FnOnce(&Self) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(StoreError::from)?;
        let result = f(self)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(result)
    }
}

/// One keyspace whose values are JSON-encoded `T`.
#[derive(Debug)]
pub struct Table<'a, T> {
    conn: &'a Connection,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Table<'_, T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove every key.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.conn
            .execute(&format!("DELETE FROM \"{}\"", self.name), [])?;
        trace!(table = %self.name, "cleared");
        Ok(())
    }

    /// Delete `key`, returning whether it existed.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let removed = self.conn.execute(
            &format!("DELETE FROM \"{}\" WHERE key = ?1", self.name),
            params![key],
        )?;
        Ok(removed > 0)
    }

    pub fn contains_key(&self, key: &str) -> Result<bool, StoreError> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT 1 FROM \"{}\" WHERE key = ?1", self.name),
                params![key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of keys.
    pub fn len(&self) -> Result<usize, StoreError> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\"", self.name),
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT key FROM \"{}\" ORDER BY key", self.name))?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl<T: Serialize> Table<'_, T> {
    /// Store `value` under `key`, replacing any previous value.
    pub fn set(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" (key, value) VALUES (?1, ?2) \
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                self.name
            ),
            params![key, json],
        )?;
        Ok(())
    }
}

impl<T: DeserializeOwned> Table<'_, T> {
    pub fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                &format!("SELECT value FROM \"{}\" WHERE key = ?1", self.name),
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(StoreError::from)
    }

    /// Every value, in key order.
    pub fn get_all(&self) -> Result<Vec<T>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT value FROM \"{}\" ORDER BY key", self.name))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|json| serde_json::from_str(json).map_err(StoreError::from))
            .collect()
    }
}
