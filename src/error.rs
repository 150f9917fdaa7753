//! Unified error handling for the raspberry crate
//!
//! Every fallible operation in the library returns [`Result`], whose error
//! side is the single [`Error`] enum defined here. Variants follow the
//! taxonomy the orchestrators rely on:
//!
//! - [`Error::Validation`] - out-of-range or blank input, client-correctable
//! - [`Error::NotFound`] - identifier absent from the store or the mirror
//! - [`Error::Consistency`] - mirror state diverged right after a write
//! - [`Error::Storage`] / [`Error::Database`] - I/O or store failures
//!
//! # Usage
//!
//! ```rust,ignore
//! use raspberry::error::{Error, ErrorCategory};
//!
//! fn handle_error(err: Error) {
//!     if err.is_client_error() {
//!         println!("Rejected: {err}");
//!     } else {
//!         eprintln!("Fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid input supplied by the caller
    Validation,
    /// Requested record does not exist
    NotFound,
    /// Stores diverged after a mutation
    Consistency,
    /// Storage and I/O errors
    Storage,
    /// Configuration errors
    Config,
}

impl ErrorCategory {
    /// Short machine-friendly name for the category
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Consistency => "consistency",
            Self::Storage => "storage",
            Self::Config => "config",
        }
    }
}

/// Unified error type for the raspberry crate
#[derive(Error, Debug)]
pub enum Error {
    /// Input rejected before any store was touched
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identifier absent from the store or the mirror
    #[error("Not found: {0}")]
    NotFound(String),

    /// Mirror file does not reflect the write that just happened
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Counter or mirror file I/O failure, or store unreachable
    #[error("Storage error: {context}")]
    Storage {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Relational store errors
    #[error("Database error: {0}")]
    Database(#[source] rusqlite::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a consistency error
    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    /// Create a storage error without an underlying cause
    pub fn storage(context: impl Into<String>) -> Self {
        Self::Storage {
            context: context.into(),
            source: None,
        }
    }

    /// Create a storage error with context and source
    pub fn storage_with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error category for handling strategies
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Consistency(_) => ErrorCategory::Consistency,
            Self::Storage { .. } | Self::Database(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether the caller can fix the request and try again
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Validation | ErrorCategory::NotFound
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err)
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::storage_with_source("I/O failure", err)
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
