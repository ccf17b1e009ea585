//! Key-value persistence
//!
//! The engine only needs `get` / `save` / `remove` / `clear` / `size_in_bytes`
//! over JSON documents. `SqliteStore` backs the CLI; `MemoryStore` is for
//! embedding and tests. Typed accessors live on `StoreExt`.

mod schema;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::model::{Automation, Event, Pattern, RelatedTab};

pub use schema::{keys, SCHEMA};

/// Persistent Store collaborator
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn save(&self, key: &str, value: &Value) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Approximate serialized size of everything stored
    fn size_in_bytes(&self) -> Result<u64>;
}

// ============================================
// SQLITE
// ============================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic while holding the lock cannot leave SQLite half-written
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn().execute(
            r#"INSERT INTO kv_entries (key, value, updated_at)
               VALUES (?, ?, datetime('now'))
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = datetime('now')"#,
            params![key, text],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv_entries WHERE key = ?", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.conn().execute("DELETE FROM kv_entries", [])?;
        Ok(())
    }

    fn size_in_bytes(&self) -> Result<u64> {
        let size: i64 = self.conn().query_row(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM kv_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(size.max(0) as u64)
    }
}

// ============================================
// IN-MEMORY
// ============================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Value>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.entries().get(key).cloned())
    }

    fn save(&self, key: &str, value: &Value) -> Result<()> {
        self.entries().insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries().clear();
        Ok(())
    }

    fn size_in_bytes(&self) -> Result<u64> {
        let mut total = 0u64;
        for (key, value) in self.entries().iter() {
            total += key.len() as u64 + serde_json::to_string(value)?.len() as u64;
        }
        Ok(total)
    }
}

// ============================================
// TYPED ACCESSORS
// ============================================

fn load<T: DeserializeOwned, S: KeyValueStore + ?Sized>(store: &S, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

fn persist<T: Serialize, S: KeyValueStore + ?Sized>(store: &S, key: &str, value: &T) -> Result<()> {
    store.save(key, &serde_json::to_value(value)?)
}

/// Collection-level helpers over any `KeyValueStore`
pub trait StoreExt: KeyValueStore {
    fn events(&self) -> Result<Vec<Event>> {
        Ok(load(self, keys::EVENTS)?.unwrap_or_default())
    }

    fn save_events(&self, events: &[Event]) -> Result<()> {
        persist(self, keys::EVENTS, &events)
    }

    fn patterns(&self) -> Result<Vec<Pattern>> {
        Ok(load(self, keys::PATTERNS)?.unwrap_or_default())
    }

    fn save_patterns(&self, patterns: &[Pattern]) -> Result<()> {
        persist(self, keys::PATTERNS, &patterns)
    }

    fn automations(&self) -> Result<Vec<Automation>> {
        Ok(load(self, keys::AUTOMATIONS)?.unwrap_or_default())
    }

    fn save_automations(&self, automations: &[Automation]) -> Result<()> {
        persist(self, keys::AUTOMATIONS, &automations)
    }

    fn shown_patterns(&self) -> Result<Vec<String>> {
        Ok(load(self, keys::SHOWN_PATTERNS)?.unwrap_or_default())
    }

    fn save_shown_patterns(&self, signatures: &[String]) -> Result<()> {
        persist(self, keys::SHOWN_PATTERNS, &signatures)
    }

    fn recent_patterns(&self) -> Result<BTreeMap<String, i64>> {
        Ok(load(self, keys::RECENT_PATTERNS)?.unwrap_or_default())
    }

    fn save_recent_patterns(&self, recent: &BTreeMap<String, i64>) -> Result<()> {
        persist(self, keys::RECENT_PATTERNS, recent)
    }

    fn whitelist(&self) -> Result<Vec<String>> {
        Ok(load(self, keys::WHITELIST)?.unwrap_or_default())
    }

    fn save_whitelist(&self, whitelist: &[String]) -> Result<()> {
        persist(self, keys::WHITELIST, &whitelist)
    }

    fn tab_relationships(&self) -> Result<BTreeMap<i64, Vec<RelatedTab>>> {
        Ok(load(self, keys::TAB_RELATIONSHIPS)?.unwrap_or_default())
    }

    fn save_tab_relationships(&self, relationships: &BTreeMap<i64, Vec<RelatedTab>>) -> Result<()> {
        persist(self, keys::TAB_RELATIONSHIPS, relationships)
    }

    /// Any serde document under `key`, or its default when absent
    fn state<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        Ok(load(self, key)?.unwrap_or_default())
    }

    fn save_state<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        persist(self, key, value)
    }

    fn find_automation(&self, id: &str) -> Result<Automation> {
        self.automations()?
            .into_iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::not_found("automation", id))
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}
