use std::path::Path;

use contracts::{TrustBelief, TrustHistoryRecord};
use rescue_core::{BeliefStore, StoreError};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("sqlite store was opened read-only")]
    ReadOnly,

    #[error("session already started at tick {0}; attach the store before the first tick")]
    SessionStarted(u64),
}

/// One row of `trust_beliefs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersistedBelief {
    pub name: String,
    pub belief: TrustBelief,
    pub updated_tick: u64,
}

#[derive(Debug)]
pub struct SqliteBeliefStore {
    conn: Connection,
    read_only: bool,
}

impl SqliteBeliefStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self {
            conn,
            read_only: false,
        };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// For inspection tools; every write fails with [`PersistenceError::ReadOnly`].
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self {
            conn,
            read_only: true,
        })
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn,
            read_only: false,
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn load_belief(&self, name: &str) -> Result<Option<TrustBelief>, PersistenceError> {
        let row: Option<(f64, f64)> = self
            .conn
            .query_row(
                "SELECT competence, willingness FROM trust_beliefs WHERE name = ?1",
                params![name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.map(|(competence, willingness)| TrustBelief::new(competence, willingness)))
    }

    pub fn list_beliefs(&self) -> Result<Vec<PersistedBelief>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT name, competence, willingness, updated_tick
             FROM trust_beliefs
             ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PersistedBelief {
                name: row.get(0)?,
                belief: TrustBelief::new(row.get(1)?, row.get(2)?),
                updated_tick: u64::try_from(row.get::<_, i64>(3)?).unwrap_or_default(),
            })
        })?;

        let mut beliefs = Vec::new();
        for row in rows {
            beliefs.push(row?);
        }
        Ok(beliefs)
    }

    /// Whole-record overwrite of one teammate's belief.
    pub fn save_belief(
        &mut self,
        name: &str,
        belief: &TrustBelief,
        tick: u64,
    ) -> Result<(), PersistenceError> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO trust_beliefs (name, competence, willingness, updated_tick)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                competence = excluded.competence,
                willingness = excluded.willingness,
                updated_tick = excluded.updated_tick",
            params![
                name,
                belief.competence,
                belief.willingness,
                i64::try_from(tick).unwrap_or(i64::MAX),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn append_history_record(
        &mut self,
        record: &TrustHistoryRecord,
    ) -> Result<(), PersistenceError> {
        self.ensure_writable()?;
        self.conn.execute(
            "INSERT INTO trust_history (tick, name, willingness, competence)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                i64::try_from(record.tick).unwrap_or(i64::MAX),
                record.teammate.as_str(),
                record.willingness,
                record.competence,
            ],
        )?;
        Ok(())
    }

    /// History rows for `name` in append order, optionally only the last `limit`.
    pub fn load_history(
        &self,
        name: &str,
        limit: Option<usize>,
    ) -> Result<Vec<TrustHistoryRecord>, PersistenceError> {
        let limit = limit
            .and_then(|limit| i64::try_from(limit).ok())
            .unwrap_or(-1);
        let mut stmt = self.conn.prepare(
            "SELECT tick, name, willingness, competence FROM (
                SELECT seq, tick, name, willingness, competence
                FROM trust_history
                WHERE name = ?1
                ORDER BY seq DESC
                LIMIT ?2
             ) ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map(params![name, limit], |row| {
            Ok(TrustHistoryRecord {
                tick: u64::try_from(row.get::<_, i64>(0)?).unwrap_or_default(),
                teammate: row.get(1)?,
                willingness: row.get(2)?,
                competence: row.get(3)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Drops the belief record and history of one teammate. Returns whether a
    /// belief record existed.
    pub fn delete_teammate(&mut self, name: &str) -> Result<bool, PersistenceError> {
        self.ensure_writable()?;
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM trust_beliefs WHERE name = ?1", params![name])?;
        tx.execute("DELETE FROM trust_history WHERE name = ?1", params![name])?;
        tx.commit()?;
        Ok(removed > 0)
    }

    fn ensure_writable(&self) -> Result<(), PersistenceError> {
        if self.read_only {
            return Err(PersistenceError::ReadOnly);
        }
        Ok(())
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trust_beliefs (
                name TEXT PRIMARY KEY,
                competence REAL NOT NULL,
                willingness REAL NOT NULL,
                updated_tick INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS trust_history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                tick INTEGER NOT NULL,
                name TEXT NOT NULL,
                willingness REAL NOT NULL,
                competence REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_trust_history_name_tick ON trust_history(name, tick);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'tick-000000')",
            [],
        )?;

        Ok(())
    }
}

impl From<PersistenceError> for StoreError {
    fn from(value: PersistenceError) -> Self {
        match value {
            PersistenceError::ReadOnly => Self::ReadOnly,
            other => Self::Backend(other.to_string()),
        }
    }
}

impl BeliefStore for SqliteBeliefStore {
    fn load(&self, teammate: &str) -> Result<Option<TrustBelief>, StoreError> {
        Ok(self.load_belief(teammate)?)
    }

    fn persist(
        &mut self,
        teammate: &str,
        belief: &TrustBelief,
        tick: u64,
    ) -> Result<(), StoreError> {
        Ok(self.save_belief(teammate, belief, tick)?)
    }

    fn append_history(&mut self, record: &TrustHistoryRecord) -> Result<(), StoreError> {
        Ok(self.append_history_record(record)?)
    }
}
