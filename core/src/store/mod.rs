//! SQLite persistence for per-entity keyed state.
//!
//! RULE: Only this module talks to the database. Engines never touch
//! the store directly; they go through StateVault, which serializes
//! access per entity.

use crate::error::CoreResult;
use crate::types::EntityId;
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

// ── Entity records ─────────────────────────────────────────────────

/// In-memory snapshot of one entity's persisted keys.
///
/// Records are created lazily on first access; a key that was never
/// written reads as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityRecord {
    values: BTreeMap<String, i64>,
}

impl EntityRecord {
    pub fn get_int(&self, key: &str) -> i64 {
        self.values.get(key).copied().unwrap_or(0)
    }

    pub fn set_int(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }

    pub fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

// ── The store contract ─────────────────────────────────────────────

pub trait EntityStateStore: Send + Sync {
    fn load(&self, entity: &str) -> CoreResult<EntityRecord>;
    fn save(&self, entity: &str, record: &EntityRecord) -> CoreResult<()>;
}

// ── SQLite implementation ──────────────────────────────────────────

pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the state database at `path`. URI paths are
    /// accepted, so tests can use shared-memory databases.
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL only applies to real files; memory databases ignore it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .lock()
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }
}

impl EntityStateStore for SqliteStateStore {
    fn load(&self, entity: &str) -> CoreResult<EntityRecord> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, value FROM entity_state WHERE entity = ?1",
        )?;
        let rows = stmt.query_map(params![entity], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut record = EntityRecord::default();
        for row in rows {
            let (key, value) = row?;
            record.set_int(&key, value);
        }
        Ok(record)
    }

    fn save(&self, entity: &str, record: &EntityRecord) -> CoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM entity_state WHERE entity = ?1", params![entity])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entity_state (entity, key, value) VALUES (?1, ?2, ?3)",
            )?;
            for (key, value) in record.iter() {
                stmt.execute(params![entity, key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

// ── Serialized access ──────────────────────────────────────────────

/// Per-entity exclusive access to the store.
///
/// Every read-modify-write runs under that entity's lock, so
/// concurrent operations on one entity serialize end to end while
/// distinct entities proceed in parallel.
pub struct StateVault {
    store: Arc<dyn EntityStateStore>,
    locks: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl StateVault {
    pub fn new(store: Arc<dyn EntityStateStore>) -> Self {
        Self { store, locks: Mutex::new(HashMap::new()) }
    }

    fn entity_lock(&self, entity: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(entity.to_string())
            .or_default()
            .clone()
    }

    /// Load, mutate, save under the entity's lock.
    ///
    /// An Err from the closure aborts before the save, so validation
    /// failures leave no trace. A failed save is logged and the
    /// closure's result is returned anyway: durability is lost, the
    /// logical effect stands.
    pub fn update<R>(
        &self,
        entity: &str,
        f: impl FnOnce(&mut EntityRecord) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let lock = self.entity_lock(entity);
        let _guard = lock.lock();
        let mut record = self.store.load(entity)?;
        let out = f(&mut record)?;
        if let Err(e) = self.store.save(entity, &record) {
            log::warn!("state save failed for '{entity}': {e}");
        }
        Ok(out)
    }

    /// Load-only access under the entity's lock.
    pub fn read<R>(
        &self,
        entity: &str,
        f: impl FnOnce(&EntityRecord) -> R,
    ) -> CoreResult<R> {
        let lock = self.entity_lock(entity);
        let _guard = lock.lock();
        let record = self.store.load(entity)?;
        Ok(f(&record))
    }
}
