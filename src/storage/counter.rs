//! Durable identifier allocation
//!
//! The counter file holds the highest identifier ever issued. It only moves
//! forward: deletes never give identifiers back, and on startup the value is
//! reconciled against the highest identifier the relational store reports.
//!
//! # File format
//!
//! ```text
//! <?xml version="1.0" encoding="UTF-8"?>
//! <counter>
//!     <lastId>42</lastId>
//! </counter>
//! ```
//!
//! Every read-modify-write runs under one mutex so two callers can never
//! persist the same "next" value.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock};

use regex::Regex;

use crate::error::{Error, Result};

use super::write_atomically;

const ROOT_ELEMENT: &str = "counter";
const VALUE_ELEMENT: &str = "lastId";

/// Issues identifiers that are never reused
#[derive(Debug)]
pub struct IdAllocator {
    path: PathBuf,
    indent: usize,
    lock: Mutex<()>,
}

impl IdAllocator {
    /// Create an allocator backed by the given counter file
    pub fn new(path: impl Into<PathBuf>, indent: usize) -> Self {
        Self {
            path: path.into(),
            indent,
            lock: Mutex::new(()),
        }
    }

    /// Path of the counter file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted counter value
    ///
    /// A missing file or an unparsable value yields `None`; only genuine read
    /// failures (permissions, unreadable device) are errors.
    pub fn current(&self) -> Result<Option<i64>> {
        let _guard = self.lock()?;
        self.load()
    }

    /// Increment the counter, persist it and return the new identifier
    pub fn allocate_next(&self) -> Result<i64> {
        let _guard = self.lock()?;

        let current = self.load()?.unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::storage("Identifier counter overflowed"))?;
        self.persist(next)?;

        tracing::debug!(id = next, "Allocated identifier");
        Ok(next)
    }

    /// Raise the counter to at least `max_observed_id` and return the result
    ///
    /// The file is only rewritten when the value changes, so applying the same
    /// authority twice leaves the file untouched the second time.
    pub fn synchronize_with_authority(&self, max_observed_id: i64) -> Result<i64> {
        let _guard = self.lock()?;

        let current = self.load()?;
        let target = current.unwrap_or(0).max(max_observed_id.max(0));

        if current != Some(target) {
            self.persist(target)?;
            tracing::info!(
                previous = ?current,
                authority = max_observed_id,
                counter = target,
                "Counter synchronized with store"
            );
        }

        Ok(target)
    }

    /// Administrative override of the persisted value
    pub fn reset(&self, value: i64) -> Result<()> {
        if value < 0 {
            return Err(Error::validation(format!(
                "counter value must not be negative, got {value}"
            )));
        }

        let _guard = self.lock()?;
        self.persist(value)?;

        tracing::warn!(counter = value, "Counter reset");
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::storage("Counter lock poisoned"))
    }

    fn load(&self) -> Result<Option<i64>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::storage_with_source(
                    format!("Failed to read counter file: {}", self.path.display()),
                    e,
                ))
            }
        };

        let value = parse_counter(&content);
        if value.is_none() {
            tracing::warn!(path = %self.path.display(), "Counter file unparsable, treating as absent");
        }
        Ok(value)
    }

    fn persist(&self, value: i64) -> Result<()> {
        let document = render_counter(value, self.indent);
        write_atomically(&self.path, &document).map_err(|e| {
            Error::storage_with_source(
                format!("Failed to write counter file: {}", self.path.display()),
                e,
            )
        })
    }
}

/// Render the counter document with the given indentation width
fn render_counter(value: i64, indent: usize) -> String {
    let pad = " ".repeat(indent);
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <{ROOT_ELEMENT}>\n\
         {pad}<{VALUE_ELEMENT}>{value}</{VALUE_ELEMENT}>\n\
         </{ROOT_ELEMENT}>\n"
    )
}

/// Extract the counter value; `None` for anything but a non-negative integer
fn parse_counter(content: &str) -> Option<i64> {
    static COUNTER_RE: OnceLock<Regex> = OnceLock::new();

    let re = COUNTER_RE.get_or_init(|| {
        Regex::new(r"<counter>\s*<lastId>\s*([0-9]+)\s*</lastId>\s*</counter>")
            .expect("Invalid regex pattern")
    });

    re.captures(content)?.get(1)?.as_str().parse::<i64>().ok()
}
