//! Persistence for the three redundant stores
//!
//! - [`repository`] - relational store (SQLite), source of truth for queries
//! - [`schema`] - schema bootstrapping with bounded backoff
//! - [`counter`] - durable identifier counter file
//! - [`mirror`] - delimited text mirror of the live record set

pub mod counter;
pub mod mirror;
pub mod repository;
pub mod schema;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub use counter::IdAllocator;
pub use mirror::{MirrorFormat, MirrorSynchronizer};
pub use repository::{MockMovieRepository, MovieRepository, SqliteMovieRepository};
pub use schema::{BootstrapState, ProbeError, SchemaBootstrapper, SchemaProbe};

/// Replace `path` with `contents` in one step
///
/// Writes a sibling temp file, syncs it, then renames it over the target so
/// readers see either the old file or the new one, never a partial write.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let temp_path = temp_path_for(path);

    let mut file = File::create(&temp_path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()?;
    drop(file);

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    tracing::debug!(path = %path.display(), bytes = contents.len(), "File rewritten");
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
