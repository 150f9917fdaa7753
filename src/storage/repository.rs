//! Repository pattern for the relational store
//!
//! This module provides the trait-based abstraction the orchestrators talk to,
//! decoupling them from the storage implementation:
//! - SQLite for production
//! - An in-memory mock for tests, with write-failure injection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      MovieService                           │
//! │            (create / update / delete / intervals)           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    MovieRepository                          │
//! └─────────────────────────────────────────────────────────────┘
//!                   ┌──────────┴──────────┐
//!                   ▼                     ▼
//!          ┌─────────────────┐   ┌─────────────────┐
//!          │     SQLite      │   │      Mock       │
//!          │  Implementation │   │ Implementation  │
//!          └─────────────────┘   └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use raspberry::storage::repository::{MovieRepository, SqliteMovieRepository};
//!
//! // Production: use SQLite (schema is created by the bootstrapper)
//! let repo = SqliteMovieRepository::open("data/movies.db")?;
//!
//! // Testing: use Mock
//! let mock_repo = MockMovieRepository::new();
//! ```

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};

use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::models::{MovieFilter, MovieRecord, PageRequest, Paged};

use super::schema::{ProbeError, SchemaProbe};

/// Idempotent schema statement run by the bootstrapper
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS movies (
        id INTEGER PRIMARY KEY,
        year INTEGER NOT NULL,
        title TEXT NOT NULL,
        studios TEXT NOT NULL,
        producers TEXT NOT NULL,
        winner BOOLEAN NOT NULL DEFAULT 0
    );

    CREATE INDEX IF NOT EXISTS idx_movies_winner
        ON movies(winner);

    CREATE INDEX IF NOT EXISTS idx_movies_year
        ON movies(year);
"#;

const SELECT_COLUMNS: &str = "SELECT id, year, title, studios, producers, winner FROM movies";

// ============================================================================
// Repository Trait
// ============================================================================

/// Relational store operations used by the orchestrators
pub trait MovieRepository: Send + Sync {
    /// Highest identifier currently stored, if any
    fn find_max_id(&self) -> Result<Option<i64>>;

    /// Insert a record with an already allocated id
    fn insert(&self, record: &MovieRecord) -> Result<()>;

    /// Overwrite the record with the same id; false when no row matched
    fn update(&self, record: &MovieRecord) -> Result<bool>;

    /// Delete by id; false when no row matched
    fn delete(&self, id: i64) -> Result<bool>;

    /// Get record by id
    fn find_by_id(&self, id: i64) -> Result<Option<MovieRecord>>;

    /// Check if a record exists
    fn exists(&self, id: i64) -> Result<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Filtered, paginated listing ordered by id
    fn find_all(&self, filter: &MovieFilter, page: PageRequest) -> Result<Paged<MovieRecord>>;

    /// Every winning record, ordered by year then id
    fn find_winners(&self) -> Result<Vec<MovieRecord>>;

    /// Every live record, ordered by id
    fn find_every(&self) -> Result<Vec<MovieRecord>>;

    /// Count total records
    fn count(&self) -> Result<u64>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of MovieRepository
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteMovieRepository {
    conn: Mutex<Connection>,
}

impl SqliteMovieRepository {
    /// Open (or create) the database file without touching the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::storage_with_source(
                        format!("Failed to create database directory: {}", parent.display()),
                        e,
                    )
                })?;
            }
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        tracing::info!(path = %path.display(), "SQLite repository opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("SQLite connection lock poisoned"))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<MovieRecord> {
        Ok(MovieRecord {
            id: row.get(0)?,
            year: row.get(1)?,
            title: row.get(2)?,
            studios: row.get(3)?,
            producers: row.get(4)?,
            winner: row.get(5)?,
        })
    }

    /// Build the WHERE clause and its parameters for a filter
    fn where_clause(filter: &MovieFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut conditions = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(year) = filter.year {
            conditions.push("year = ?");
            values.push(Box::new(year));
        }

        if let Some(winner) = filter.winner {
            conditions.push("winner = ?");
            values.push(Box::new(winner));
        }

        if let Some(title) = filter.title.as_deref().map(str::trim) {
            if !title.is_empty() {
                conditions.push("instr(lower(title), ?) > 0");
                values.push(Box::new(title.to_lowercase()));
            }
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

impl MovieRepository for SqliteMovieRepository {
    fn find_max_id(&self) -> Result<Option<i64>> {
        let conn = self.conn()?;
        let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM movies", [], |row| row.get(0))?;
        Ok(max)
    }

    fn insert(&self, record: &MovieRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
                INSERT INTO movies (id, year, title, studios, producers, winner)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                record.id,
                record.year,
                record.title,
                record.studios,
                record.producers,
                record.winner
            ],
        )?;

        Ok(())
    }

    fn update(&self, record: &MovieRecord) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            r#"
                UPDATE movies
                SET year = ?2, title = ?3, studios = ?4, producers = ?5, winner = ?6
                WHERE id = ?1
                "#,
            params![
                record.id,
                record.year,
                record.title,
                record.studios,
                record.producers,
                record.winner
            ],
        )?;

        Ok(changed > 0)
    }

    fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn.execute("DELETE FROM movies WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    fn find_by_id(&self, id: i64) -> Result<Option<MovieRecord>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;

        Ok(record)
    }

    fn find_all(&self, filter: &MovieFilter, page: PageRequest) -> Result<Paged<MovieRecord>> {
        let conn = self.conn()?;
        let (where_sql, mut values) = Self::where_clause(filter);

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM movies{where_sql}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        values.push(Box::new(i64::from(page.size)));
        values.push(Box::new(page.offset() as i64));

        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS}{where_sql} ORDER BY id LIMIT ? OFFSET ?"
        ))?;
        let items = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Paged {
            items,
            page: page.number,
            size: page.size,
            total: total as u64,
        })
    }

    fn find_winners(&self) -> Result<Vec<MovieRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE winner = 1 ORDER BY year, id"
        ))?;
        let winners = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(winners)
    }

    fn find_every(&self) -> Result<Vec<MovieRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let records = stmt
            .query_map([], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(records)
    }

    fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM movies", [], |row| row.get(0))?;
        Ok(total as u64)
    }
}

impl SchemaProbe for SqliteMovieRepository {
    fn probe(&self) -> std::result::Result<(), ProbeError> {
        let conn = self.conn().map_err(ProbeError::Other)?;

        let result = conn
            .prepare("SELECT 1 FROM movies LIMIT 1")
            .and_then(|mut stmt| stmt.exists([]));

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_missing_table(&e) => Err(ProbeError::MissingTable(e.to_string())),
            Err(e) => Err(ProbeError::Other(e.into())),
        }
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }
}

/// Whether SQLite reported the relation as absent
fn is_missing_table(err: &rusqlite::Error) -> bool {
    err.to_string().contains("no such table")
}

// ============================================================================
// Mock Implementation (for testing)
// ============================================================================

/// In-memory mock implementation of MovieRepository
///
/// Useful for testing without database dependencies. Writes can be made to
/// fail on demand to exercise partial-failure paths.
pub struct MockMovieRepository {
    records: RwLock<BTreeMap<i64, MovieRecord>>,
    fail_writes: AtomicBool,
}

impl MockMovieRepository {
    /// Create a new mock repository
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent insert/update/delete fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Get the number of records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage("mock store rejected the write"));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<i64, MovieRecord>>> {
        self.records
            .read()
            .map_err(|_| Error::storage("mock store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<i64, MovieRecord>>> {
        self.records
            .write()
            .map_err(|_| Error::storage("mock store lock poisoned"))
    }
}

impl Default for MockMovieRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MovieRepository for MockMovieRepository {
    fn find_max_id(&self) -> Result<Option<i64>> {
        Ok(self.read()?.keys().next_back().copied())
    }

    fn insert(&self, record: &MovieRecord) -> Result<()> {
        self.check_writable()?;
        let mut records = self.write()?;
        if records.contains_key(&record.id) {
            return Err(Error::storage(format!("duplicate id {}", record.id)));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    fn update(&self, record: &MovieRecord) -> Result<bool> {
        self.check_writable()?;
        let mut records = self.write()?;
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: i64) -> Result<bool> {
        self.check_writable()?;
        Ok(self.write()?.remove(&id).is_some())
    }

    fn find_by_id(&self, id: i64) -> Result<Option<MovieRecord>> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn find_all(&self, filter: &MovieFilter, page: PageRequest) -> Result<Paged<MovieRecord>> {
        let records = self.read()?;
        let needle = filter
            .title
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let matching: Vec<&MovieRecord> = records
            .values()
            .filter(|r| filter.year.map_or(true, |y| r.year == y))
            .filter(|r| filter.winner.map_or(true, |w| r.winner == w))
            .filter(|r| {
                needle
                    .as_ref()
                    .map_or(true, |n| r.title.to_lowercase().contains(n.as_str()))
            })
            .collect();

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size as usize)
            .cloned()
            .collect();

        Ok(Paged {
            items,
            page: page.number,
            size: page.size,
            total,
        })
    }

    fn find_winners(&self) -> Result<Vec<MovieRecord>> {
        let mut winners: Vec<MovieRecord> =
            self.read()?.values().filter(|r| r.winner).cloned().collect();
        winners.sort_by_key(|r| (r.year, r.id));
        Ok(winners)
    }

    fn find_every(&self) -> Result<Vec<MovieRecord>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }
}

impl SchemaProbe for MockMovieRepository {
    fn probe(&self) -> std::result::Result<(), ProbeError> {
        Ok(())
    }

    fn create_schema(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
