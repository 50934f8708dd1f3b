//! Ledger of already-processed recordings.
//!
//! A plain newline-delimited list of path strings. Loading a missing file
//! yields an empty ledger; [`Ledger::flush`] rewrites the whole file with the
//! union of what was loaded and what was recorded since.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::core::persist::replace_file;

/// Errors that can occur with the ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write ledger {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Set of processed path identities, backed by a text file
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Location of the ledger file
    path: PathBuf,

    /// Every processed path (loaded plus recorded)
    entries: BTreeSet<String>,

    /// Entries added since the last load or flush
    unflushed: usize,
}

impl Ledger {
    /// Create an empty ledger that will be written to `path`
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: BTreeSet::new(),
            unflushed: 0,
        }
    }

    /// Load the ledger, treating a missing file as empty
    pub async fn load(path: PathBuf) -> Result<Self, LedgerError> {
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(source) => return Err(LedgerError::Read { path, source }),
        };

        let entries = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            path,
            entries,
            unflushed: 0,
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether a path has been processed
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    /// Mark a path processed (buffered until [`Ledger::flush`]).
    ///
    /// Returns false if the path was already present.
    pub fn record(&mut self, path: impl Into<String>) -> bool {
        let added = self.entries.insert(path.into());
        if added {
            self.unflushed += 1;
        }
        added
    }

    /// Record every path in `paths`, returning how many were new
    pub fn absorb<I, S>(&mut self, paths: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = 0;
        for path in paths {
            if self.record(path) {
                added += 1;
            }
        }
        added
    }

    /// Number of processed paths
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there are recorded entries not yet on disk
    pub fn is_dirty(&self) -> bool {
        self.unflushed > 0
    }

    /// Iterate processed paths in sorted order
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Replace the ledger file with the full current set
    pub async fn flush(&mut self) -> Result<(), LedgerError> {
        let mut content = String::new();
        for entry in &self.entries {
            content.push_str(entry);
            content.push('\n');
        }

        replace_file(&self.path, content.into_bytes())
            .await
            .map_err(|source| LedgerError::Write {
                path: self.path.clone(),
                source,
            })?;

        self.unflushed = 0;
        Ok(())
    }
}
