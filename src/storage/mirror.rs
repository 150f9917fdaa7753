//! Delimited-text mirror of the live record set
//!
//! The mirror is a human-readable file kept equal to the relational store
//! after every successful mutation:
//!
//! ```text
//! id;year;title;studios;producers;winner;;
//! 1;1980;Can't Stop the Music;Associated Film Distribution;Allan Carr;yes;;
//! 2;1980;Cruising;Lorimar Productions, United Artists;Jerry Weintraub;;;
//! ```
//!
//! Every operation is snapshot → transform → persist over the whole file,
//! serialized by one mutex. The file is replaced atomically, then read back
//! to confirm the edit landed.
//!
//! Read path: the writable copy if present, otherwise the bundled seed,
//! otherwise a header-only file. Lines without an identifier are dropped
//! during the rewrite.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::models::{MovieInput, MovieRecord};

use super::write_atomically;

const HEADER_FIELDS: [&str; 6] = ["id", "year", "title", "studios", "producers", "winner"];

/// Number of empty fields reserved at the end of every line
const RESERVED_FIELDS: usize = 2;

/// Line layout of the mirror file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorFormat {
    pub delimiter: String,
    pub winner_literal: String,
}

impl Default for MirrorFormat {
    fn default() -> Self {
        Self {
            delimiter: String::from(";"),
            winner_literal: String::from("yes"),
        }
    }
}

impl MirrorFormat {
    pub fn new(delimiter: impl Into<String>, winner_literal: impl Into<String>) -> Self {
        Self {
            delimiter: delimiter.into(),
            winner_literal: winner_literal.into(),
        }
    }

    /// Fixed first line of the file
    pub fn header(&self) -> String {
        self.join(HEADER_FIELDS.iter().map(|f| f.to_string()))
    }

    /// One record as a mirror line
    pub fn render(&self, record: &MovieRecord) -> String {
        let winner = if record.winner {
            self.winner_literal.clone()
        } else {
            String::new()
        };

        self.join(
            [
                record.id.to_string(),
                record.year.to_string(),
                self.sanitize(&record.title),
                self.sanitize(&record.studios),
                self.sanitize(&record.producers),
                winner,
            ]
            .into_iter(),
        )
    }

    /// Parse a data line back into a valid record
    pub fn parse(&self, line: &str) -> Option<MovieRecord> {
        let fields: Vec<&str> = line.split(self.delimiter.as_str()).collect();
        if fields.len() < 5 {
            return None;
        }

        let id = fields[0].trim().parse::<i64>().ok().filter(|id| *id > 0)?;
        let year = fields[1].trim().parse::<i32>().ok()?;
        let winner = fields
            .get(5)
            .map(|w| w.trim())
            .filter(|w| !w.is_empty())
            .is_some_and(|w| w.eq_ignore_ascii_case(self.winner_literal.trim()));

        let input = MovieInput {
            year,
            title: fields[2].to_string(),
            studios: fields[3].to_string(),
            producers: fields[4].to_string(),
            winner,
        }
        .validate()
        .ok()?;

        Some(MovieRecord::from_input(id, input))
    }

    /// Identifier field of a line, if present and non-blank
    pub fn id_field<'a>(&self, line: &'a str) -> Option<&'a str> {
        let id = line.split(self.delimiter.as_str()).next()?.trim();
        (!id.is_empty()).then_some(id)
    }

    fn matches(&self, line: &str, id: &str) -> bool {
        self.id_field(line) == Some(id)
    }

    fn join(&self, fields: impl Iterator<Item = String>) -> String {
        let mut line = fields.collect::<Vec<_>>().join(&self.delimiter);
        for _ in 0..RESERVED_FIELDS {
            line.push_str(&self.delimiter);
        }
        line
    }

    /// Fields are never quoted, so the delimiter and line breaks become spaces
    fn sanitize(&self, field: &str) -> String {
        field
            .replace(self.delimiter.as_str(), " ")
            .replace(['\r', '\n'], " ")
    }
}

/// Keeps the mirror file in lockstep with store mutations
#[derive(Debug)]
pub struct MirrorSynchronizer {
    path: PathBuf,
    seed_path: Option<PathBuf>,
    format: MirrorFormat,
    lock: Mutex<()>,
}

impl MirrorSynchronizer {
    /// Create a synchronizer for the writable `path`, optionally seeded from `seed_path`
    pub fn new(path: impl Into<PathBuf>, seed_path: Option<PathBuf>, format: MirrorFormat) -> Self {
        Self {
            path: path.into(),
            seed_path,
            format,
            lock: Mutex::new(()),
        }
    }

    /// Writable mirror path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Line layout in use
    pub fn format(&self) -> &MirrorFormat {
        &self.format
    }

    /// Whether the writable copy exists yet
    pub fn is_materialized(&self) -> bool {
        self.path.is_file()
    }

    /// Add the line for a newly created record
    pub fn append(&self, record: &MovieRecord) -> Result<()> {
        let id = record.id.to_string();
        let line = self.format.render(record);

        self.rewrite(
            |lines| {
                let before = lines.len();
                lines.retain(|l| !self.format.matches(l, &id));
                if lines.len() != before {
                    tracing::warn!(id = record.id, "Replacing stale mirror line on append");
                }
                lines.push(line.clone());
                Ok(())
            },
            |lines| self.expect_single(lines, &id, &line),
        )?;

        tracing::info!(id = record.id, "Mirror line appended");
        Ok(())
    }

    /// Replace the line of an existing record
    pub fn update(&self, record: &MovieRecord) -> Result<()> {
        let id = record.id.to_string();
        let line = self.format.render(record);

        self.rewrite(
            |lines| {
                let position = lines
                    .iter()
                    .position(|l| self.format.matches(l, &id))
                    .ok_or_else(|| {
                        Error::not_found(format!("no mirror line for id {}", record.id))
                    })?;

                lines[position] = line.clone();
                let mut seen = false;
                lines.retain(|l| {
                    if !self.format.matches(l, &id) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
                Ok(())
            },
            |lines| self.expect_single(lines, &id, &line),
        )?;

        tracing::info!(id = record.id, "Mirror line updated");
        Ok(())
    }

    /// Drop every line of a deleted record
    pub fn remove(&self, id: i64) -> Result<()> {
        let key = id.to_string();

        self.rewrite(
            |lines| {
                let before = lines.len();
                lines.retain(|l| !self.format.matches(l, &key));
                if lines.len() == before {
                    return Err(Error::not_found(format!("no mirror line for id {id}")));
                }
                Ok(())
            },
            |lines| self.expect_absent(lines, &key),
        )?;

        tracing::info!(id = id, "Mirror line removed");
        Ok(())
    }

    /// Rewrite the whole mirror from a record set
    pub fn rebuild(&self, records: &[MovieRecord]) -> Result<()> {
        let _guard = self.lock()?;

        let mut sorted: Vec<&MovieRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.id);
        let lines: Vec<String> = sorted.iter().map(|r| self.format.render(r)).collect();

        self.persist(&lines)?;
        tracing::info!(records = lines.len(), path = %self.path.display(), "Mirror rebuilt");
        Ok(())
    }

    /// Records parsed from the current mirror (or its seed); invalid lines are skipped
    pub fn records(&self) -> Result<Vec<MovieRecord>> {
        let _guard = self.lock()?;

        let lines = self.load()?;
        let mut records = Vec::with_capacity(lines.len());
        for line in &lines {
            match self.format.parse(line) {
                Some(record) => records.push(record),
                None => tracing::warn!(line = %line, "Skipping mirror line that is not a valid record"),
            }
        }
        Ok(records)
    }

    /// Lines currently carrying the given identifier
    pub fn lines_for(&self, id: i64) -> Result<Vec<String>> {
        let _guard = self.lock()?;

        let key = id.to_string();
        Ok(self
            .read_lines(&self.path)?
            .unwrap_or_default()
            .into_iter()
            .filter(|l| self.format.matches(l, &key))
            .collect())
    }

    /// Snapshot, transform in memory, persist, then read back and verify
    fn rewrite<E, V>(&self, edit: E, verify: V) -> Result<()>
    where
        E: FnOnce(&mut Vec<String>) -> Result<()>,
        V: FnOnce(&[String]) -> Result<()>,
    {
        let _guard = self.lock()?;

        let mut lines = self.load()?;
        edit(&mut lines)?;
        self.persist(&lines)?;

        let written = self.read_lines(&self.path)?.ok_or_else(|| {
            Error::consistency(format!(
                "mirror file vanished after write: {}",
                self.path.display()
            ))
        })?;
        verify(&written)
    }

    fn expect_single(&self, lines: &[String], id: &str, expected: &str) -> Result<()> {
        let matching: Vec<&String> = lines
            .iter()
            .filter(|l| self.format.matches(l, id))
            .collect();

        match matching.as_slice() {
            [line] if line.as_str() == expected => Ok(()),
            [] => Err(Error::consistency(format!(
                "mirror has no line for id {id} after write"
            ))),
            _ => Err(Error::consistency(format!(
                "mirror line for id {id} does not match the record after write"
            ))),
        }
    }

    fn expect_absent(&self, lines: &[String], id: &str) -> Result<()> {
        if lines.iter().any(|l| self.format.matches(l, id)) {
            return Err(Error::consistency(format!(
                "mirror still holds id {id} after removal"
            )));
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|_| Error::storage("Mirror lock poisoned"))
    }

    /// Data lines from the writable copy, else the seed, else nothing
    fn load(&self) -> Result<Vec<String>> {
        if let Some(lines) = self.read_lines(&self.path)? {
            return Ok(lines);
        }

        if let Some(seed) = &self.seed_path {
            if let Some(lines) = self.read_lines(seed)? {
                tracing::info!(seed = %seed.display(), "Seeding mirror from bundled copy");
                return Ok(lines);
            }
        }

        tracing::info!(path = %self.path.display(), "No mirror found, starting from header only");
        Ok(Vec::new())
    }

    /// Read data lines from `path`; `None` when the file does not exist
    fn read_lines(&self, path: &Path) -> Result<Option<Vec<String>>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::storage_with_source(
                    format!("Failed to read mirror file: {}", path.display()),
                    e,
                ))
            }
        };

        let mut dropped = 0usize;
        let lines: Vec<String> = content
            .lines()
            .enumerate()
            .filter_map(|(index, raw)| {
                let line = raw.trim_end_matches('\r');
                if line.trim().is_empty() {
                    return None;
                }
                match self.format.id_field(line) {
                    Some(id) if index == 0 && id.eq_ignore_ascii_case(HEADER_FIELDS[0]) => None,
                    Some(_) => Some(line.to_string()),
                    None => {
                        dropped += 1;
                        None
                    }
                }
            })
            .collect();

        if dropped > 0 {
            tracing::warn!(path = %path.display(), dropped = dropped, "Dropping mirror lines without an identifier");
        }

        Ok(Some(lines))
    }

    fn persist(&self, lines: &[String]) -> Result<()> {
        let mut content = self.format.header();
        content.push('\n');
        for line in lines {
            content.push_str(line);
            content.push('\n');
        }

        write_atomically(&self.path, &content).map_err(|e| {
            Error::storage_with_source(
                format!("Failed to write mirror file: {}", self.path.display()),
                e,
            )
        })
    }
}
