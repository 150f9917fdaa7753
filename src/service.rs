//! Create / update / delete orchestration across the three stores
//!
//! Every mutation runs in a fixed order with no two-phase commit:
//!
//! ```text
//! create:  allocate id ──► store insert ──► mirror append
//! update:  store lookup ──► store update ──► mirror update
//! delete:  store lookup ──► store delete ──► mirror remove
//! ```
//!
//! The order bounds what a partial failure can look like. An identifier is
//! consumed before the store is written, so it can never be handed out twice;
//! a failure after the store write leaves the mirror behind the store and is
//! reported to the caller as a failed operation, never as a partial success.
//!
//! Mutations hold one service-wide write lock from the first store write to
//! the mirror write, so the mirror always ends up carrying the same version
//! of a record as the store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::analytics::compute_intervals;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{IntervalReport, MovieFilter, MovieInput, MovieRecord, PageRequest, Paged};
use crate::storage::{
    IdAllocator, MirrorFormat, MirrorSynchronizer, MovieRepository, SchemaBootstrapper,
    SchemaProbe, SqliteMovieRepository,
};
use crate::utils::retry::RetryConfig;

/// A relational store the service can both query and bootstrap
pub trait MovieStore: MovieRepository + SchemaProbe {}

impl<T: MovieRepository + SchemaProbe> MovieStore for T {}

/// What happened during startup reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StartupReport {
    /// Records imported from the mirror into an empty store
    pub imported: usize,

    /// Counter value after synchronizing with the store
    pub counter: i64,

    /// Whether the writable mirror was (re)written from the store
    pub mirror_rebuilt: bool,
}

/// Use cases consumed by the HTTP layer and the CLI
pub struct MovieService {
    store: Arc<dyn MovieStore>,
    allocator: Arc<IdAllocator>,
    mirror: Arc<MirrorSynchronizer>,
    writes: Mutex<()>,
}

impl MovieService {
    /// Assemble a service from already constructed components
    pub fn new(
        store: Arc<dyn MovieStore>,
        allocator: Arc<IdAllocator>,
        mirror: Arc<MirrorSynchronizer>,
    ) -> Self {
        Self {
            store,
            allocator,
            mirror,
            writes: Mutex::new(()),
        }
    }

    /// Open the SQLite store and the file-backed stores described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::config(format!("{e:#}")))?;

        let store = SqliteMovieRepository::open(&config.database.sqlite_path)?;

        let allocator = IdAllocator::new(
            &config.storage.counter_path,
            config.storage.counter_indent,
        );

        let mirror = MirrorSynchronizer::new(
            &config.storage.mirror_path,
            config.storage.mirror_seed_path.clone(),
            MirrorFormat::new(
                config.storage.delimiter.clone(),
                config.storage.winner_literal.clone(),
            ),
        );

        Ok(Self::new(Arc::new(store), Arc::new(allocator), Arc::new(mirror)))
    }

    /// Identifier allocator in use
    pub fn allocator(&self) -> &IdAllocator {
        &self.allocator
    }

    /// Mirror synchronizer in use
    pub fn mirror(&self) -> &MirrorSynchronizer {
        &self.mirror
    }

    /// Bring the three stores into agreement before serving requests
    ///
    /// 1. Ensure the schema exists (the only retried step).
    /// 2. Import the mirror (or its seed) into an empty store.
    /// 3. Raise the counter to the store's highest identifier.
    /// 4. Materialize the writable mirror if it does not exist yet.
    pub async fn initialize(&self, bootstrap: RetryConfig) -> Result<StartupReport> {
        let mut bootstrapper = SchemaBootstrapper::new(bootstrap);
        bootstrapper.ensure_schema(&*self.store).await?;

        let mut report = StartupReport::default();

        if self.store.count()? == 0 {
            report.imported = self.import_mirror()?;
        }

        let authority = self.store.find_max_id()?.unwrap_or(0);
        report.counter = self.allocator.synchronize_with_authority(authority)?;

        if !self.mirror.is_materialized() {
            self.mirror.rebuild(&self.store.find_every()?)?;
            report.mirror_rebuilt = true;
        }

        info!(
            imported = report.imported,
            counter = report.counter,
            mirror_rebuilt = report.mirror_rebuilt,
            "Startup reconciliation complete"
        );
        Ok(report)
    }

    fn import_mirror(&self) -> Result<usize> {
        let mut unique: BTreeMap<i64, MovieRecord> = BTreeMap::new();
        for record in self.mirror.records()? {
            if unique.contains_key(&record.id) {
                warn!(id = record.id, "Duplicate id in mirror, keeping first occurrence");
                continue;
            }
            unique.insert(record.id, record);
        }

        for record in unique.values() {
            self.store.insert(record)?;
        }

        if !unique.is_empty() {
            info!(records = unique.len(), "Imported mirror into empty store");
        }
        Ok(unique.len())
    }

    /// Create a record: allocate, insert, append to the mirror
    pub fn create_movie(&self, input: MovieInput) -> Result<MovieRecord> {
        let input = input.validate()?;

        let _writes = self.write_lock()?;
        let id = self.allocator.allocate_next()?;
        let record = MovieRecord::from_input(id, input);

        if let Err(e) = self.store.insert(&record) {
            warn!(id = id, error = %e, "Store insert failed, identifier stays consumed");
            return Err(e);
        }

        if let Err(e) = self.mirror.append(&record) {
            error!(id = id, error = %e, "Mirror append failed after store insert, mirror lags store");
            return Err(e);
        }

        info!(id = id, year = record.year, title = %record.title, "Movie created");
        Ok(record)
    }

    /// Overwrite an existing record in the store and the mirror
    pub fn update_movie(&self, id: i64, input: MovieInput) -> Result<MovieRecord> {
        let input = input.validate()?;
        let _writes = self.write_lock()?;

        if !self.store.exists(id)? {
            return Err(Error::not_found(format!("movie {id}")));
        }

        let record = MovieRecord::from_input(id, input);
        if !self.store.update(&record)? {
            return Err(Error::not_found(format!("movie {id}")));
        }

        if let Err(e) = self.mirror.update(&record) {
            error!(id = id, error = %e, "Mirror update failed after store update, mirror lags store");
            return Err(e);
        }

        info!(id = id, "Movie updated");
        Ok(record)
    }

    /// Remove a record from the store and the mirror; the counter is untouched
    pub fn delete_movie(&self, id: i64) -> Result<()> {
        let _writes = self.write_lock()?;

        if !self.store.exists(id)? {
            return Err(Error::not_found(format!("movie {id}")));
        }

        if !self.store.delete(id)? {
            return Err(Error::not_found(format!("movie {id}")));
        }

        if let Err(e) = self.mirror.remove(id) {
            error!(id = id, error = %e, "Mirror removal failed after store delete, mirror lags store");
            return Err(e);
        }

        info!(id = id, "Movie deleted");
        Ok(())
    }

    /// Get record by id
    pub fn get_movie(&self, id: i64) -> Result<MovieRecord> {
        self.store
            .find_by_id(id)?
            .ok_or_else(|| Error::not_found(format!("movie {id}")))
    }

    /// Filtered, paginated listing
    pub fn list_movies(&self, filter: &MovieFilter, page: PageRequest) -> Result<Paged<MovieRecord>> {
        self.store.find_all(filter, page)
    }

    /// Producers with the shortest and longest gaps between consecutive wins
    pub fn get_intervals(&self) -> Result<IntervalReport> {
        let winners = self.store.find_winners()?;
        Ok(compute_intervals(&winners))
    }

    /// Rewrite the mirror from the store; returns the number of lines written
    pub fn rebuild_mirror(&self) -> Result<usize> {
        let _writes = self.write_lock()?;
        let records = self.store.find_every()?;
        self.mirror.rebuild(&records)?;
        Ok(records.len())
    }

    fn write_lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| Error::storage("Service write lock poisoned"))
    }

    /// Administrative counter override
    pub fn reset_counter(&self, value: i64) -> Result<()> {
        self.allocator.reset(value)
    }
}
