// Core data structures for the raspberry award catalog

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Earliest accepted award year
pub const MIN_YEAR: i32 = 1900;

/// Latest accepted award year
pub const MAX_YEAR: i32 = 2100;

/// Maximum length of any text field, counted in characters
pub const MAX_TEXT_LEN: usize = 255;

/// Largest page size accepted by listing queries
pub const MAX_PAGE_SIZE: u32 = 100;

/// A nominated movie as persisted in every store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieRecord {
    pub id: i64,
    pub year: i32,
    pub title: String,
    pub studios: String,
    pub producers: String,
    pub winner: bool,
}

impl MovieRecord {
    /// Build a record from an allocated id and validated input
    pub fn from_input(id: i64, input: MovieInput) -> Self {
        Self {
            id,
            year: input.year,
            title: input.title,
            studios: input.studios,
            producers: input.producers,
            winner: input.winner,
        }
    }
}

/// Client-supplied fields for create and update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieInput {
    pub year: i32,
    pub title: String,
    pub studios: String,
    pub producers: String,
    #[serde(default)]
    pub winner: bool,
}

impl MovieInput {
    /// Trim text fields and check every field against its bounds
    pub fn validate(self) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&self.year) {
            return Err(Error::validation(format!(
                "year {} is outside {MIN_YEAR}..={MAX_YEAR}",
                self.year
            )));
        }

        Ok(Self {
            year: self.year,
            title: clean_text("title", &self.title)?,
            studios: clean_text("studios", &self.studios)?,
            producers: clean_text("producers", &self.producers)?,
            winner: self.winner,
        })
    }
}

fn clean_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return Err(Error::validation(format!("{field} must not be blank")));
    }

    if trimmed.chars().count() > MAX_TEXT_LEN {
        return Err(Error::validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }

    Ok(trimmed.to_string())
}

/// Optional criteria for listing movies
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovieFilter {
    pub year: Option<i32>,
    pub winner: Option<bool>,
    /// Case-insensitive substring of the title
    pub title: Option<String>,
}

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub number: u32,
    pub size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            number: 0,
            size: 20,
        }
    }
}

impl PageRequest {
    /// Create a page request, rejecting sizes outside 1..=MAX_PAGE_SIZE
    pub fn new(number: u32, size: u32) -> Result<Self> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(Error::validation(format!(
                "page size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(Self { number, size })
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> u64 {
        u64::from(self.number) * u64::from(self.size)
    }
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
}

/// Gap between two consecutive wins by the same producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInterval {
    pub producer: String,
    pub interval: i32,
    pub previous_win: i32,
    pub following_win: i32,
}

impl ProducerInterval {
    pub fn new(producer: impl Into<String>, previous_win: i32, following_win: i32) -> Self {
        Self {
            producer: producer.into(),
            interval: following_win - previous_win,
            previous_win,
            following_win,
        }
    }
}

/// Shortest and longest producer intervals, ties included
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalReport {
    pub min: Vec<ProducerInterval>,
    pub max: Vec<ProducerInterval>,
}
